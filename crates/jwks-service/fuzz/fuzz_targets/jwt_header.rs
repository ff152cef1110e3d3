#![no_main]

use jwks_service::crypto::{extract_jwt_kid, verify_jwt};
use jwks_service::models::JsonWebKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    // Header parsing runs before any signature check; it must never panic.
    let kid = extract_jwt_kid(token);

    // Verification against a syntactically valid but unrelated key must
    // reject, never panic.
    let jwk = JsonWebKey {
        kid: kid.unwrap_or_default(),
        alg: "RS256".to_string(),
        kty: "RSA".to_string(),
        use_: "sig".to_string(),
        n: "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw".to_string(),
        e: "AQAB".to_string(),
    };
    let _ = verify_jwt(token, &jwk, false);
});
