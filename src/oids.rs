//! Well-known OIDs.
//!
//! MIB-II and SNMPv2-MIB objects used by both roles, and the alarm
//! notification subtree carried by every alarm trap.

use crate::oid;
use crate::oid::Oid;

/// sysDescr.0 (1.3.6.1.2.1.1.1.0), the one object an agent serves.
pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

/// sysUpTime.0 (1.3.6.1.2.1.1.3.0), first binding of every v2 trap.
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// snmpTrapOID.0 (1.3.6.1.6.3.1.1.4.1.0), names the notification.
pub fn snmp_trap_oid() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
}

/// coldStart (1.3.6.1.6.3.1.1.5.1).
pub fn cold_start() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1)
}

/// Alarm notification (1.2.3.4.5), the value of snmpTrapOID.0 in an alarm
/// trap and the root of its four fields.
pub fn alarm_notification() -> Oid {
    oid!(1, 2, 3, 4, 5)
}

/// Alarm code field (1.2.3.4.5.1).
pub fn alarm_code() -> Oid {
    oid!(1, 2, 3, 4, 5, 1)
}

/// Originating agent id field (1.2.3.4.5.2).
pub fn agent_id() -> Oid {
    oid!(1, 2, 3, 4, 5, 2)
}

/// Alarm text field (1.2.3.4.5.3).
pub fn alarm_text() -> Oid {
    oid!(1, 2, 3, 4, 5, 3)
}

/// Originating agent address field (1.2.3.4.5.4), `host/port` text.
pub fn agent_address() -> Oid {
    oid!(1, 2, 3, 4, 5, 4)
}
