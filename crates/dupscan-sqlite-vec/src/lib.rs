//! Process-wide registration of the `sqlite-vec` extension.
//!
//! Once registered, every SQLite connection opened afterwards exposes
//! `vec_version()`, `vec_f32()` and `vec_distance_cosine()`, which the chunk
//! index uses to rank stored embeddings without leaving SQLite.

use std::sync::OnceLock;

const AUTO_ENABLE_ENV: &str = "DUPSCAN_SQLITE_VEC_AUTO";

static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

/// Register `sqlite-vec` as an auto-extension for this process.
///
/// Registration happens at most once; later calls return the cached outcome.
/// Setting `DUPSCAN_SQLITE_VEC_AUTO` to `0`, `false` or `off` disables it so
/// the in-process cosine fallback is used instead.
///
/// # Errors
///
/// Returns a description of why the extension is not available.
pub fn register_auto_extension() -> Result<(), String> {
    if matches!(
        std::env::var(AUTO_ENABLE_ENV).ok().as_deref(),
        Some("0" | "false" | "off")
    ) {
        return Err(format!("sqlite-vec auto-extension disabled by {AUTO_ENABLE_ENV}"));
    }

    REGISTRATION.get_or_init(register_once).clone()
}

/// Returns true when the connection can evaluate `sqlite-vec` functions.
#[must_use]
pub fn is_available(conn: &rusqlite::Connection) -> bool {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .is_ok()
}

fn register_once() -> Result<(), String> {
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: unsafe extern "C" fn(
        *mut rusqlite::ffi::sqlite3,
        *mut *const std::os::raw::c_char,
        *const rusqlite::ffi::sqlite3_api_routines,
    ) -> std::os::raw::c_int =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(format!("sqlite3_auto_extension failed with rc={rc}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn registration_exposes_cosine_distance() {
        let result = register_auto_extension();
        assert!(result.is_ok(), "registration failed: {result:?}");

        let conn = Connection::open_in_memory().expect("open in-memory sqlite");
        assert!(is_available(&conn));

        let distance: f64 = conn
            .query_row(
                "SELECT vec_distance_cosine(vec_f32('[1.0, 0.0]'), vec_f32('[0.0, 1.0]'))",
                [],
                |row| row.get(0),
            )
            .expect("cosine distance should evaluate");
        assert!((distance - 1.0).abs() < 1e-6);
    }
}
