use std::fmt;

/// Every failure the ledger reports. No variant is ever produced after a partial mutation:
/// operations validate fully before they write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    // validation
    SelfDelegation,
    ZeroTargetDelegation,
    WrongMode,
    TooManyDelegates,
    PercentBoundExceeded,
    AmountBoundExceeded,
    BoundaryInvalid,
    OrdinalRegression,
    // history
    PrunedHistory,
    UnknownCheckpoint,
    // state
    ArithmeticOverflow,
    ArithmeticUnderflow,
    InvariantViolation,
    // idempotency markers
    AlreadyRevoked,
    NoSuchDelegate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-fixable, nothing was written.
    Validation,
    /// Query against pruned or not yet existing history.
    History,
    /// An internal invariant broke. Never expected; indicates a bug.
    State,
    /// The ledger is already in the requested state.
    Idempotent,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            SelfDelegation | ZeroTargetDelegation | WrongMode |
            TooManyDelegates | PercentBoundExceeded | AmountBoundExceeded |
            BoundaryInvalid | OrdinalRegression => ErrorKind::Validation,
            PrunedHistory | UnknownCheckpoint => ErrorKind::History,
            ArithmeticOverflow | ArithmeticUnderflow | InvariantViolation => {
                ErrorKind::State
            }
            AlreadyRevoked | NoSuchDelegate => ErrorKind::Idempotent,
        }
    }

    #[inline(always)]
    pub fn is_state_error(&self) -> bool {
        self.kind() == ErrorKind::State
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LedgerError::*;
        f.write_str(match self {
            SelfDelegation => "cannot delegate to self",
            ZeroTargetDelegation => "cannot delegate to zero",
            WrongMode => "delegation mode mismatch",
            TooManyDelegates => "max delegates exceeded",
            PercentBoundExceeded => "total delegated bips exceed 10000",
            AmountBoundExceeded => "total delegated amount exceeds balance",
            BoundaryInvalid => "cleanup boundary must increase and be in the past",
            OrdinalRegression => "ordinal moved backwards",
            PrunedHistory => "reading from cleaned-up history",
            UnknownCheckpoint => "ordinal is not in the past",
            ArithmeticOverflow => "arithmetic overflow",
            ArithmeticUnderflow => "arithmetic underflow",
            InvariantViolation => "vote power conservation violated",
            AlreadyRevoked => "delegation already revoked or zero",
            NoSuchDelegate => "no such delegate",
        })
    }
}

impl std::error::Error for LedgerError {}

#[test]
fn test_error_kinds() {
    assert_eq!(LedgerError::WrongMode.kind(), ErrorKind::Validation);
    assert_eq!(LedgerError::PrunedHistory.kind(), ErrorKind::History);
    assert_eq!(LedgerError::NoSuchDelegate.kind(), ErrorKind::Idempotent);
    assert!(LedgerError::ArithmeticUnderflow.is_state_error());
    assert!(!LedgerError::AlreadyRevoked.is_state_error());
}
