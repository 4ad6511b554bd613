//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>`; every OID this crate speaks
//! (sysDescr.0, snmpTrapOID.0, the alarm fields) fits inline.

use crate::error::internal::OidErrorKind;
use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (subidentifiers) allowed in an OID.
///
/// Per RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a value".
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
///
/// Equality, hashing and ordering are structural over the arcs, so an OID
/// can key a map. `1.2.3.4.5.1` is never equal to `1.2.3.4.5`; use
/// [`starts_with`](Self::starts_with) for subtree checks.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an OID from arc values.
    ///
    /// Fails with [`Error::InvalidOid`] unless the arcs can be encoded and
    /// decoded back unchanged: at least two arcs, at most [`MAX_OID_LEN`],
    /// and a first pair that fits X.690 Section 8.19.4.
    ///
    /// ```
    /// use snmp_alarm::oid::Oid;
    ///
    /// let oid = Oid::new([1, 3, 6, 1]).unwrap();
    /// assert_eq!(oid.len(), 4);
    ///
    /// assert!(Oid::new([1]).is_err());
    /// assert!(Oid::new([5, 1]).is_err());
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Result<Self> {
        let oid = Self {
            arcs: arcs.into_iter().collect(),
        };
        match check_arcs(&oid.arcs) {
            Ok(()) => Ok(oid),
            Err(kind) => Err(invalid(kind, &oid.to_string())),
        }
    }

    /// Create an OID from a slice of arcs, with the checks of
    /// [`new`](Self::new).
    pub fn from_slice(arcs: &[u32]) -> Result<Self> {
        Self::new(arcs.iter().copied())
    }

    /// Used by [`oid!`](crate::oid!) after its compile-time check.
    #[doc(hidden)]
    pub fn from_literal(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted notation (e.g., "1.3.6.1.2.1.1.1.0").
    ///
    /// A single leading dot is accepted. The first two arcs are checked
    /// against X.690 Section 8.19.4 so that every parsed OID can be encoded.
    ///
    /// ```
    /// use snmp_alarm::oid::Oid;
    ///
    /// let oid = Oid::parse(".1.3.6.1.2.1.1.1.0").unwrap();
    /// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
    ///
    /// assert!(Oid::parse("1.3..6").is_err());
    /// assert!(Oid::parse("3.1").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(invalid(OidErrorKind::Empty, s));
        }

        let mut arcs = SmallVec::new();
        for part in trimmed.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| invalid(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        check_arcs(&arcs).map_err(|kind| invalid(kind, s))?;
        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID lies in the subtree rooted at `other`.
    ///
    /// ```
    /// use snmp_alarm::oid;
    ///
    /// let alarm_code = oid!(1, 2, 3, 4, 5, 1);
    /// assert!(alarm_code.starts_with(&oid!(1, 2, 3, 4, 5)));
    /// assert!(!oid!(1, 2, 3, 4, 50).starts_with(&oid!(1, 2, 3, 4, 5)));
    /// ```
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Create a child OID by appending an arc.
    ///
    /// Fails only when the parent already has [`MAX_OID_LEN`] arcs.
    pub fn child(&self, arc: u32) -> Result<Oid> {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Self::new(arcs)
    }

    /// Encode the content octets of this OID (X.690 Section 8.19).
    ///
    /// The first two arcs share one subidentifier (`arc1 * 40 + arc2`); the
    /// rest are base-128 with a continuation bit.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        // construction guarantees two arcs and a first pair that fits a u32
        if let [first, second, rest @ ..] = self.arcs.as_slice() {
            encode_subidentifier(&mut bytes, first * 40 + second);
            for &arc in rest {
                encode_subidentifier(&mut bytes, arc);
            }
        }

        bytes
    }

    /// Decode content octets produced by [`to_ber`](Self::to_ber).
    pub(crate) fn from_ber(data: &[u8]) -> std::result::Result<Self, OidErrorKind> {
        let mut arcs = SmallVec::new();
        if data.is_empty() {
            return Err(OidErrorKind::Empty);
        }

        let (first_subid, consumed) = decode_subidentifier(data)?;
        let mut rest = &data[consumed..];
        let first = (first_subid / 40).min(2);
        arcs.push(first);
        arcs.push(first_subid - first * 40);

        while !rest.is_empty() {
            let (arc, consumed) = decode_subidentifier(rest)?;
            rest = &rest[consumed..];
            arcs.push(arc);

            if arcs.len() > MAX_OID_LEN {
                return Err(OidErrorKind::TooManyArcs {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                });
            }
        }

        Ok(Self { arcs })
    }
}

/// Whether `arcs` form an OID that survives BER encoding unchanged.
///
/// Usable in const context; [`oid!`](crate::oid!) calls it at compile time.
#[doc(hidden)]
pub const fn is_encodable(arcs: &[u32]) -> bool {
    check_arcs(arcs).is_ok()
}

const fn check_arcs(arcs: &[u32]) -> std::result::Result<(), OidErrorKind> {
    if arcs.len() < 2 {
        return Err(OidErrorKind::TooFewArcs(arcs.len()));
    }
    if arcs.len() > MAX_OID_LEN {
        return Err(OidErrorKind::TooManyArcs {
            count: arcs.len(),
            max: MAX_OID_LEN,
        });
    }
    let (first, second) = (arcs[0], arcs[1]);
    if first > 2 {
        return Err(OidErrorKind::InvalidFirstArc(first));
    }
    // first * 40 + second must fit one u32 subidentifier
    if (first < 2 && second >= 40) || (first == 2 && second > u32::MAX - 80) {
        return Err(OidErrorKind::InvalidSecondArc { first, second });
    }
    Ok(())
}

fn invalid(kind: OidErrorKind, input: &str) -> Box<Error> {
    tracing::debug!(target: "snmp_alarm::oid", { snmp.oid = input, kind = %kind }, "rejected OID literal");
    Error::InvalidOid(input.into()).boxed()
}

fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    let groups = ((32 - value.leading_zeros()).max(1)).div_ceil(7);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one base-128 subidentifier, returning (value, bytes consumed).
fn decode_subidentifier(data: &[u8]) -> std::result::Result<(u32, usize), OidErrorKind> {
    let mut value: u32 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(OidErrorKind::SubidentifierOverflow);
        }
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(OidErrorKind::UnterminatedSubidentifier)
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Build an OID from constant arcs.
///
/// The arcs are checked at compile time, so a literal that could not be
/// encoded fails the build instead of producing a different OID on the
/// wire.
///
/// ```
/// use snmp_alarm::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
///
/// ```compile_fail
/// let bad = snmp_alarm::oid!(5, 1);
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {{
        const ARCS: &[u32] = &[$($arc),*];
        const { assert!($crate::oid::is_encodable(ARCS), "OID literal cannot be encoded") };
        $crate::oid::Oid::from_literal(ARCS)
    }};
}
