use std::env;

/// 布尔型环境变量：true/1 为真（大小写不敏感），未设置或空值取默认
pub fn env_is_true(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        }
        _ => default,
    }
}

/// 字符串环境变量，未设置或为空时取默认值
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
