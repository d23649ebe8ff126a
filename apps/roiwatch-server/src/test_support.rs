pub mod env {
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::sync::{Mutex, MutexGuard};

    static PROCESS_ENV: Mutex<()> = Mutex::new(());

    /// Exclusive hold on the process environment for one test.
    ///
    /// The listed keys start out unset. Every key touched through the scope
    /// gets its prior value back when the scope drops.
    pub struct EnvScope {
        _held: MutexGuard<'static, ()>,
        prior: HashMap<&'static str, Option<OsString>>,
    }

    pub fn scoped(keys: &[&'static str]) -> EnvScope {
        let mut scope = EnvScope {
            _held: PROCESS_ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            prior: HashMap::new(),
        };
        for key in keys {
            scope.unset(*key);
        }
        scope
    }

    impl EnvScope {
        pub fn set(&mut self, key: &'static str, value: &str) {
            self.prior.entry(key).or_insert_with(|| std::env::var_os(key));
            std::env::set_var(key, value);
        }

        pub fn unset(&mut self, key: &'static str) {
            self.prior.entry(key).or_insert_with(|| std::env::var_os(key));
            std::env::remove_var(key);
        }
    }

    impl Drop for EnvScope {
        fn drop(&mut self) {
            for (key, value) in self.prior.drain() {
                match value {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}

pub mod fixture {
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::AppState;

    pub const HEADER: &str = "Timestamp,Class,Confidence,Restricted Area Violation";

    /// Detection log in a temp dir plus server state pointed at it.
    pub struct LogFixture {
        _dir: TempDir,
        pub path: PathBuf,
        pub state: AppState,
    }

    pub fn log_with(rows: &[&str]) -> LogFixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("detection_log.csv");
        let state = AppState::new(path.clone(), 64);
        let fx = LogFixture {
            _dir: dir,
            path,
            state,
        };
        fx.rewrite(rows);
        fx
    }

    impl LogFixture {
        pub fn rewrite(&self, rows: &[&str]) {
            let mut body = format!("{HEADER}\n");
            for row in rows {
                body.push_str(row);
                body.push('\n');
            }
            std::fs::write(&self.path, body).expect("write log");
        }

        pub fn append(&self, rows: &[&str]) {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&self.path)
                .expect("open log");
            for row in rows {
                writeln!(file, "{row}").expect("append row");
            }
        }
    }
}
