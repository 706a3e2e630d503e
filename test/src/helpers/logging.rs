use std::sync::Once;

static INIT: Once = Once::new();

/// Routes `log` output through env_logger once per test binary. Honors
/// `RUST_LOG`.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
