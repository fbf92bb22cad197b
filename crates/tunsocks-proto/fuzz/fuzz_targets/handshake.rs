#![no_main]
use libfuzzer_sys::fuzz_target;

use tunsocks_proto::{AuthConfig, AuthMethod, ConnectTarget, Credentials, Socks5ClientHandshake};

fuzz_target!(|data: Vec<Vec<u8>>| {
    let target = ConnectTarget::new("www.example.com", 443).unwrap();
    let auth = AuthConfig::new(vec![
        AuthMethod::UsernamePassword(Credentials::new("user", "pass").unwrap()),
        AuthMethod::Anonymous,
    ])
    .unwrap();
    let mut hs = Socks5ClientHandshake::new(target, auth);
    let _ = hs.start();
    for d in data {
        let _ = hs.handshake(&d);
    }
});
