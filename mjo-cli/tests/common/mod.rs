#![allow(dead_code)]

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const SCRIPT: &str = "\
readmark enable

func $00001234() entrypoint {
 entry:
  ld persistent int $0000aaaa
  brfalse @else
 then:
  ldc.i 1
  st.i persistent int $0000aaaa
  br @done
 else:
  text \"hello\"
  ldc.i 2
  st.i persistent int $0000aaaa
 done:
  return
}
";

pub const SYMBOLS: &str = "hashes:\n  \"0000aaaa\": AAAA\n";

pub fn mjo<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_mjo"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

pub fn stdout(output: &Output) -> String {
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout.clone()).unwrap()
}

pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Assemble [`SCRIPT`] into `dir/script.mjo`.
pub fn assembled(dir: &Path) -> PathBuf {
    let source = write(dir, "script.mjs", SCRIPT);
    let out = dir.join("script.mjo");
    stdout(&mjo([OsStr::new("asm"), source.as_os_str(), OsStr::new("-o"), out.as_os_str()]));
    out
}
