//! In-memory Tapo device for engine tests.
//!
//! Speaks both protocols over the [`HttpClient`] seam, checks the client's
//! cryptography the way a real device does, and records what it received.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pkcs8::DecodePublicKey;
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde_json::{Value, json};

use crate::Credentials;
use crate::crypto::{
    KlapCipher, aes_cbc_decrypt, aes_cbc_encrypt, base64_decode_bytes, base64_encode,
    base64_encode_bytes, generate_auth_hash, handshake1_seed_auth_hash,
    handshake2_seed_auth_hash, random_bytes, sha1,
};
use crate::error::Error;
use crate::transport::http::{HttpClient, HttpRequest, HttpResponse};

/// Knobs for misbehaving devices.
#[derive(Debug, Clone)]
pub(crate) struct MockOptions {
    /// `Set-Cookie` sent by either handshake.
    pub set_cookie: Option<String>,
    /// Cut the handshake1 body to this many bytes.
    pub truncate_handshake1: Option<usize>,
    /// Status returned by a valid handshake2.
    pub handshake2_status: u16,
    /// `error_code` of the SecurePassthrough handshake.
    pub handshake_error_code: i32,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            set_cookie: Some(format!("TP_SESSIONID={};TIMEOUT=1800", MockDevice::SESSION_ID)),
            truncate_handshake1: None,
            handshake2_status: 200,
            handshake_error_code: 0,
        }
    }
}

#[derive(Default)]
struct MockState {
    paths: Vec<String>,
    requests: Vec<Value>,
    klap_seqs: Vec<i32>,
    responses: HashMap<String, Value>,
    seeds: Option<(Vec<u8>, Vec<u8>)>,
    klap: Option<KlapCipher>,
    aes: Option<([u8; 16], [u8; 16])>,
    outer_error_code: i32,
}

pub(crate) struct MockDevice {
    credentials: Credentials,
    options: MockOptions,
    state: Mutex<MockState>,
}

impl MockDevice {
    pub const SESSION_ID: &'static str = "D1F0C0FFEE";
    pub const TOKEN: &'static str = "B2A7E9";

    pub fn new(credentials: Credentials, options: MockOptions) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            options,
            state: Mutex::new(MockState::default()),
        })
    }

    /// Sets the inner response envelope returned for `method`.
    pub fn respond(&self, method: &str, envelope: Value) {
        self.lock().responses.insert(method.to_string(), envelope);
    }

    /// Makes every later passthrough request fail with `code` on the outer
    /// envelope.
    pub fn set_outer_error_code(&self, code: i32) {
        self.lock().outer_error_code = code;
    }

    /// Paths of every request received, in order.
    pub fn paths(&self) -> Vec<String> {
        self.lock().paths.clone()
    }

    /// Decrypted request envelopes, in order.
    pub fn requests(&self) -> Vec<Value> {
        self.lock().requests.clone()
    }

    /// KLAP sequence numbers seen on `/app/request`.
    pub fn klap_seqs(&self) -> Vec<i32> {
        self.lock().klap_seqs.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn cookie_ok(request: &HttpRequest) -> bool {
        request.cookie.as_deref() == Some(format!("TP_SESSIONID={}", Self::SESSION_ID).as_str())
    }

    fn answer(state: &MockState, request: &Value) -> Value {
        let method = request["method"].as_str().unwrap_or_default();
        state
            .responses
            .get(method)
            .cloned()
            .unwrap_or_else(|| json!({"error_code": 0}))
    }

    fn handshake1(&self, state: &mut MockState, request: &HttpRequest) -> HttpResponse {
        let remote = random_bytes(16);
        let auth = generate_auth_hash(&self.credentials);
        let hash = handshake1_seed_auth_hash(&request.body, &remote, &auth);

        let mut body = remote.clone();
        body.extend_from_slice(&hash);
        if let Some(len) = self.options.truncate_handshake1 {
            body.truncate(len);
        }
        state.seeds = Some((request.body.clone(), remote));

        ok(body, self.options.set_cookie.clone())
    }

    fn handshake2(&self, state: &mut MockState, request: &HttpRequest) -> HttpResponse {
        let Some((local, remote)) = state.seeds.clone() else {
            return status(400);
        };
        let auth = generate_auth_hash(&self.credentials);
        let expected = handshake2_seed_auth_hash(&local, &remote, &auth);
        if !Self::cookie_ok(request) || request.body != expected {
            return status(403);
        }
        if self.options.handshake2_status != 200 {
            return status(self.options.handshake2_status);
        }
        state.klap = Some(KlapCipher::new(&local, &remote, &auth));
        ok(vec![], None)
    }

    fn klap_request(state: &mut MockState, request: &HttpRequest, seq: i32) -> HttpResponse {
        if !Self::cookie_ok(request) {
            return status(403);
        }
        state.klap_seqs.push(seq);
        let Some(cipher) = state.klap.as_ref() else {
            return status(403);
        };
        let Ok(plaintext) = cipher.decrypt(&request.body, seq) else {
            return status(400);
        };
        let inner: Value = serde_json::from_slice(&plaintext).unwrap();
        let answer = Self::answer(state, &inner).to_string();
        let body = cipher.encrypt_at(answer.as_bytes(), seq);
        state.requests.push(inner);

        ok(body, None)
    }

    fn rsa_handshake(&self, state: &mut MockState, request: &HttpRequest) -> HttpResponse {
        let envelope: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(envelope["method"], "handshake");

        if self.options.handshake_error_code != 0 {
            return ok(
                json!({"error_code": self.options.handshake_error_code})
                    .to_string()
                    .into_bytes(),
                None,
            );
        }

        let pem = envelope["params"]["key"].as_str().unwrap();
        let public = RsaPublicKey::from_public_key_pem(pem).unwrap();

        let secret = random_bytes(32);
        let mut key = [0u8; 16];
        let mut iv = [0u8; 16];
        key.copy_from_slice(&secret[..16]);
        iv.copy_from_slice(&secret[16..]);
        state.aes = Some((key, iv));

        let encrypted = public.encrypt(&mut OsRng, Pkcs1v15Encrypt, &secret).unwrap();
        let body = json!({"error_code": 0, "result": {"key": base64_encode_bytes(&encrypted)}});
        ok(body.to_string().into_bytes(), self.options.set_cookie.clone())
    }

    fn passthrough(&self, state: &mut MockState, request: &HttpRequest, token: &str) -> HttpResponse {
        if !Self::cookie_ok(request) {
            return status(403);
        }
        let Some((key, iv)) = state.aes else {
            return status(403);
        };

        let envelope: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(envelope["method"], "securePassthrough");
        let ciphertext = base64_decode_bytes(envelope["params"]["request"].as_str().unwrap()).unwrap();
        let plaintext = aes_cbc_decrypt(&ciphertext, &key, &iv).unwrap();
        let inner: Value = serde_json::from_slice(&plaintext).unwrap();

        if state.outer_error_code != 0 {
            let body = json!({"error_code": state.outer_error_code});
            return ok(body.to_string().into_bytes(), None);
        }

        let answer = if inner["method"] == "login_device" {
            let username = base64_encode(&hex::encode(sha1(self.credentials.username.as_bytes())));
            let password = base64_encode(self.credentials.expose_password());
            if inner["params"]["username"] == username.as_str()
                && inner["params"]["password"] == password.as_str()
            {
                json!({"error_code": 0, "result": {"token": Self::TOKEN}})
            } else {
                json!({"error_code": -1501})
            }
        } else if token != Self::TOKEN {
            json!({"error_code": 9999})
        } else {
            Self::answer(state, &inner)
        };
        state.requests.push(inner);

        let encrypted = aes_cbc_encrypt(answer.to_string().as_bytes(), &key, &iv);
        let body = json!({"error_code": 0, "result": {"response": base64_encode_bytes(&encrypted)}});
        ok(body.to_string().into_bytes(), None)
    }
}

#[async_trait]
impl HttpClient for MockDevice {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        // Let concurrent callers interleave
        tokio::task::yield_now().await;

        let mut state = self.lock();
        state.paths.push(request.path.clone());

        let response = if request.path == "/app/handshake1" {
            self.handshake1(&mut state, &request)
        } else if request.path == "/app/handshake2" {
            self.handshake2(&mut state, &request)
        } else if let Some(seq) = request.path.strip_prefix("/app/request?seq=") {
            match seq.parse() {
                Ok(seq) => Self::klap_request(&mut state, &request, seq),
                Err(_) => status(400),
            }
        } else if request.path == "/?app" {
            self.rsa_handshake(&mut state, &request)
        } else if let Some(token) = request.path.strip_prefix("/app?token=") {
            self.passthrough(&mut state, &request, token)
        } else {
            status(404)
        };

        Ok(response)
    }
}

fn ok(body: Vec<u8>, set_cookie: Option<String>) -> HttpResponse {
    HttpResponse {
        status: 200,
        body,
        set_cookie,
    }
}

fn status(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        body: vec![],
        set_cookie: None,
    }
}
