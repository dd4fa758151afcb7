use chrono::{DateTime, Utc};

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time, the value written into `created_at` / `updated_at` / `deleted_at`.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Random lowercase base36 string (`[0-9a-z]`) of the given length.
pub fn random_base36(len: usize) -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
