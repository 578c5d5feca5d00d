use super::*;
use crate::test_helpers::ENV_LOCK;

/// # Safety
/// Callers hold `ENV_LOCK` so no other test touches these vars concurrently.
unsafe fn clear_chat_env() {
    unsafe {
        std::env::remove_var("CHAT_API_BASE_URL");
        std::env::remove_var("CHAT_CONTEXT_MESSAGES");
        std::env::remove_var("CHAT_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("CHAT_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_chat_env() };

    let cfg = ChatConfig::from_env();
    assert_eq!(cfg, ChatConfig::default());
    assert_eq!(cfg.api_base_url, DEFAULT_CHAT_API_BASE_URL);
    assert_eq!(cfg.context_messages, 5);
    assert_eq!(
        cfg.timeouts,
        HttpTimeouts {
            request_secs: DEFAULT_CHAT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CHAT_CONNECT_TIMEOUT_SECS
        }
    );
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_chat_env();
        std::env::set_var("CHAT_API_BASE_URL", "https://admin.example.test/");
        std::env::set_var("CHAT_CONTEXT_MESSAGES", "3");
        std::env::set_var("CHAT_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("CHAT_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = ChatConfig::from_env();
    assert_eq!(cfg.api_base_url, "https://admin.example.test");
    assert_eq!(cfg.context_messages, 3);
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(cfg.timeouts.request(), Duration::from_secs(42));

    unsafe { clear_chat_env() };
}

#[test]
fn from_env_caps_context_messages() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_chat_env();
        std::env::set_var("CHAT_CONTEXT_MESSAGES", "12");
    }
    assert_eq!(ChatConfig::from_env().context_messages, MAX_CHAT_CONTEXT_MESSAGES);
    unsafe { clear_chat_env() };
}

#[test]
fn env_parse_falls_back_on_garbage() {
    unsafe { std::env::set_var("CHAT_TEST_GARBAGE_NUMBER", "not-a-number") };
    assert_eq!(env_parse("CHAT_TEST_GARBAGE_NUMBER", 9_u32), 9);
    assert_eq!(env_parse("CHAT_TEST_UNSET_NUMBER", 4_usize), 4);
    unsafe { std::env::remove_var("CHAT_TEST_GARBAGE_NUMBER") };
}
