// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

/// If we get the given HTTP status code from the validation service, token
/// endpoint or discovery endpoint, is it worth backing off and retrying?
pub fn is_retriable(code: u16) -> bool {
    match code {
        // Request Timeout: the server gave up waiting on us, nothing wrong
        // with the request itself.
        408 => true,

        // Too Many Requests: throttled, backoff is exactly what's asked for.
        429 => true,

        // Internal Server Error: generic, might be intermittent.
        500 => true,

        // Bad Gateway: usually a front door that couldn't reach the service.
        502 => true,

        // Service Unavailable: the quintessential "try again later".
        503 => true,

        // Gateway Timeout: a gateway being up at all is hopeful enough.
        504 => true,

        // 401 and 404 are handled separately by the service client, since they
        // need a token or endpoint refresh before a retry makes sense.
        // 400 (Bad Request), 403 (Forbidden), 501 (Not Implemented)... never.
        _ => false,
    }
}
