#![no_main]

use jwks_service::crypto::from_stored_key;
use libfuzzer_sys::fuzz_target;
use secrecy::SecretBox;

fuzz_target!(|data: &[u8]| {
    // Plain DER path
    let _ = from_stored_key(data, None);

    // Sealed path: nonce/tag splitting and AEAD open must reject garbage
    let master_key = SecretBox::new(Box::new(vec![7u8; 32]));
    let _ = from_stored_key(data, Some(&master_key));
});
