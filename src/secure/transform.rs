use once_cell::sync::Lazy;
use regex::Regex;

pub const ENTRY_MODULE: &str = "app";
pub const BOOTSTRAP_FILE: &str = "bootstrap_env.py";

static MAIN_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"if\s+(?:__name__\s*==\s*['"]__main__['"]|['"]__main__['"]\s*==\s*__name__)\s*:"#)
        .unwrap()
});

/// Rewrites the `__main__` guard so the module body runs on import
pub fn unguard_main(source: &str) -> (String, bool) {
    if !MAIN_GUARD.is_match(source) {
        return (source.to_string(), false);
    }
    (MAIN_GUARD.replace_all(source, "if True:").into_owned(), true)
}

pub fn bootstrap_source(framework_package: &str) -> String {
    format!(
        r#"import sys
import {framework}

try:
    import {module}
except Exception as exc:
    print(f"Boot Error: Failed to load compiled {module}: {{exc}}")
    sys.exit(1)
"#,
        framework = framework_package,
        module = ENTRY_MODULE
    )
}
