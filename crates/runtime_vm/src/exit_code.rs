//! # Exit Codes
//!
//! | Range | Class | Raised by |
//! |-------|-------|-----------|
//! | `0` | success | |
//! | `1..=15` | system | the VM itself (message checks, gas, runtime rules) |
//! | `16..=31` | common actor | built-in actors |
//! | `>= 32` | actor specific | individual actors |
//!
//! Receipts store the numeric value; [`ExitCode`] only adds names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric outcome of applying a message or invoking a method.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitCode(i64);

impl ExitCode {
    pub const OK: ExitCode = ExitCode(0);

    pub const SYS_ERR_SENDER_INVALID: ExitCode = ExitCode(1);
    pub const SYS_ERR_SENDER_STATE_INVALID: ExitCode = ExitCode(2);
    pub const SYS_ERR_INVALID_METHOD: ExitCode = ExitCode(3);
    pub const SYS_ERR_RESERVED1: ExitCode = ExitCode(4);
    pub const SYS_ERR_INVALID_RECEIVER: ExitCode = ExitCode(5);
    pub const SYS_ERR_INSUFFICIENT_FUNDS: ExitCode = ExitCode(6);
    pub const SYS_ERR_OUT_OF_GAS: ExitCode = ExitCode(7);
    pub const SYS_ERR_FORBIDDEN: ExitCode = ExitCode(8);
    pub const SYS_ERR_ILLEGAL_ACTOR: ExitCode = ExitCode(9);
    pub const SYS_ERR_ILLEGAL_ARGUMENT: ExitCode = ExitCode(10);
    pub const SYS_ERR_SERIALIZATION: ExitCode = ExitCode(11);
    pub const SYS_ERR_RESERVED3: ExitCode = ExitCode(12);
    pub const SYS_ERR_RESERVED4: ExitCode = ExitCode(13);
    pub const SYS_ERR_RESERVED5: ExitCode = ExitCode(14);
    pub const SYS_ERR_RESERVED6: ExitCode = ExitCode(15);

    pub const ERR_ILLEGAL_ARGUMENT: ExitCode = ExitCode(16);
    pub const ERR_NOT_FOUND: ExitCode = ExitCode(17);
    pub const ERR_FORBIDDEN: ExitCode = ExitCode(18);
    pub const ERR_INSUFFICIENT_FUNDS: ExitCode = ExitCode(19);
    pub const ERR_ILLEGAL_STATE: ExitCode = ExitCode(20);
    pub const ERR_SERIALIZATION: ExitCode = ExitCode(21);

    pub const ERR_PLACEHOLDER: ExitCode = ExitCode(1000);

    #[must_use]
    pub const fn new(value: i64) -> Self {
        ExitCode(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Whether the code belongs to the VM-reserved range.
    pub const fn is_system_error(self) -> bool {
        self.0 >= 1 && self.0 <= 15
    }

    /// Symbolic name, `None` for codes without one.
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "Ok",
            1 => "SysErrSenderInvalid",
            2 => "SysErrSenderStateInvalid",
            3 => "SysErrInvalidMethod",
            4 => "SysErrReserved1",
            5 => "SysErrInvalidReceiver",
            6 => "SysErrInsufficientFunds",
            7 => "SysErrOutOfGas",
            8 => "SysErrForbidden",
            9 => "SysErrorIllegalActor",
            10 => "SysErrorIllegalArgument",
            11 => "SysErrSerialization",
            12 => "SysErrorReserved3",
            13 => "SysErrorReserved4",
            14 => "SysErrorReserved5",
            15 => "SysErrorReserved6",
            16 => "ErrIllegalArgument",
            17 => "ErrNotFound",
            18 => "ErrForbidden",
            19 => "ErrInsufficientFunds",
            20 => "ErrIllegalState",
            21 => "ErrSerialization",
            1000 => "ErrPlaceholder",
            _ => return None,
        };
        Some(name)
    }
}

impl From<i64> for ExitCode {
    fn from(value: i64) -> Self {
        ExitCode(value)
    }
}

impl From<ExitCode> for i64 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Debug for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
