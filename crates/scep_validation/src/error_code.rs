// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The status codes the validation service answers with.

use std::fmt;
use std::str::FromStr;

macro_rules! error_codes {
    ($($(#[$meta:meta])* $variant:ident,)*) => {
        /// Outcome of a call to the validation service, parsed from the `code`
        /// field of its response.
        ///
        /// Anything the service sends that isn't in this list becomes
        /// [`ErrorCode::Unknown`], which is a failure like any other.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorCode {
            $($(#[$meta])* $variant,)*
            /// The service sent a code we don't know, or no code at all.
            Unknown,
        }

        impl ErrorCode {
            /// Every code the service publishes, `Unknown` excluded.
            pub const KNOWN: &'static [ErrorCode] = &[$(ErrorCode::$variant,)*];

            /// Total: never fails, never maps an unrecognized string to `Success`.
            pub fn parse(code: &str) -> Self {
                match code {
                    $(stringify!($variant) => ErrorCode::$variant,)*
                    _ => ErrorCode::Unknown,
                }
            }

            /// The name used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => stringify!($variant),)*
                    ErrorCode::Unknown => "Unknown",
                }
            }
        }
    };
}

error_codes! {
    Success,
    CertificateRequestDecodingFailed,
    ChallengePasswordMissing,
    ChallengeDeserializationError,
    ChallengeDecryptionError,
    ChallengeDecodingError,
    ChallengeInvalidTimestamp,
    ChallengeExpired,
    SubjectNameMissing,
    SubjectNameMismatch,
    SubjectAltNameMissing,
    SubjectAltNameMismatch,
    KeyUsageMissing,
    KeyUsageMismatch,
    ExtendedKeyUsageMissing,
    ExtendedKeyUsageMismatch,
    TransactionIdMissing,
    CertificateRequestMissing,
    CallerInfoMissing,
    RegisteredChallengeNotFound,
    ChallengeAlreadyUsed,
    /// The device or request isn't enrolled for this certificate.
    UnauthorizedRequest,
    BadRequest,
    InternalServiceError,
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
