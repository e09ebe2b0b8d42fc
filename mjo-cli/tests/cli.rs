mod common;

use std::fs;
use std::path::Path;

use common::*;
use pretty_assertions::assert_eq;

fn p(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn disassembly_reassembles_to_the_same_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let mjo_path = assembled(dir.path());

    let text = stdout(&mjo(["disasm", p(&mjo_path)]));
    assert!(text.starts_with("readmark enable\n"), "{text}");
    assert!(text.contains("func $00001234() entrypoint {"));
    assert!(text.contains("  brfalse       @block_"));

    let again = write(dir.path(), "again.mjs", &text);
    let again_mjo = dir.path().join("again.mjo");
    stdout(&mjo(["asm", p(&again), "-o", p(&again_mjo)]));
    assert_eq!(fs::read(&again_mjo).unwrap(), fs::read(&mjo_path).unwrap());
}

#[test]
fn listing_form() {
    let dir = tempfile::tempdir().unwrap();
    let mjo_path = assembled(dir.path());
    let text = stdout(&mjo(["disasm", "--list", p(&mjo_path)]));
    assert!(text.contains("index $00001234 0x0 entrypoint"), "{text}");
    assert!(text.contains("0000: ld            persistent int $0000aaaa"), "{text}");
}

#[test]
fn decompile_with_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let mjo_path = assembled(dir.path());
    let symbols = write(dir.path(), "symbols.yaml", SYMBOLS);

    let text = stdout(&mjo(["decompile", "--symbols", p(&symbols), p(&mjo_path)]));
    let expected = "\
func $00001234() entrypoint {
  if (AAAA) {
    AAAA = 1;
  } else {
    text(\"hello\");
    AAAA = 2;
  }
  return;
}
";
    assert_eq!(text, expected);
}

#[test]
fn batch_mode_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let good = assembled(dir.path());
    let bad = write(dir.path(), "bad.mjo", "not a script");
    let out = dir.path().join("out");

    let output = mjo(["decompile", "-o", p(&out), p(&bad), p(&good)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&format!("Error: {}: ", bad.display())), "{stderr}");
    assert!(stderr.contains("Error: 1 files failed"), "{stderr}");
    assert!(out.join("script.txt").exists());
    assert!(!out.join("bad.txt").exists());
}

#[test]
fn single_file_errors_exit_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mjo");
    let output = mjo(["info", p(&missing)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error: "));
}

#[test]
fn hashes_names() {
    let text = stdout(&mjo(["hash", "$main", "@x"]));
    let expected = format!(
        "${:08x} $main\n${:08x} @x\n",
        mjo_isa::sjis::hash_name("$main").unwrap(),
        mjo_isa::sjis::hash_name("@x").unwrap()
    );
    assert_eq!(text, expected);

    let text = stdout(&mjo(["hash", "--crc64", "abc"]));
    assert_eq!(text, format!("{:016x} abc\n", mjo_isa::crc::hash64(b"abc")));
}

#[test]
fn info_shows_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let mjo_path = assembled(dir.path());
    let symbols = write(dir.path(), "symbols.yaml", "hashes:\n  \"00001234\": main\n");
    let text = stdout(&mjo(["info", "--symbols", p(&symbols), p(&mjo_path)]));
    assert!(text.contains("Encrypted:        no"), "{text}");
    assert!(text.contains("Entry point:      $00001234 main"), "{text}");
    assert!(text.contains("Functions:        1"), "{text}");
    assert!(text.contains("  $00001234 0x0000 main"), "{text}");
}

#[test]
fn config_supplies_the_encrypt_default() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "script.mjs", SCRIPT);
    let config = write(dir.path(), "mjo.yaml", "encrypt: true\n");
    let out = dir.path().join("out.mjo");

    stdout(&mjo(["--config", p(&config), "asm", p(&source), "-o", p(&out)]));
    assert!(fs::read(&out).unwrap().starts_with(mjo_file::MAGIC_ENCRYPTED));

    stdout(&mjo(["--config", p(&config), "asm", "--no-encrypt", p(&source), "-o", p(&out)]));
    assert!(fs::read(&out).unwrap().starts_with(mjo_file::MAGIC_PLAIN));

    // encrypted input disassembles the same
    stdout(&mjo(["asm", "--encrypt", p(&source), "-o", p(&out)]));
    let text = stdout(&mjo(["disasm", p(&out)]));
    assert!(text.contains("text          \"hello\""), "{text}");
}

#[test]
fn strings_round_trip_through_a_table() {
    let dir = tempfile::tempdir().unwrap();
    let mjo_path = assembled(dir.path());
    let table = dir.path().join("strings.yaml");
    let ext = dir.path().join("ext.mjs");

    stdout(&mjo(["strings", p(&mjo_path), "-o", p(&table), "--asm", p(&ext)]));
    let yaml = fs::read_to_string(&table).unwrap();
    assert!(yaml.contains("L1: hello"), "{yaml}");
    assert!(fs::read_to_string(&ext).unwrap().contains("%{L1}"));

    let back = dir.path().join("back.mjo");
    stdout(&mjo(["asm", p(&ext), "--strings", p(&table), "-o", p(&back)]));
    assert_eq!(fs::read(&back).unwrap(), fs::read(&mjo_path).unwrap());

    // without the table the key cannot be resolved
    let output = mjo(["asm", p(&ext), "-o", p(&back)]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn find_walks_directories() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let mjo_path = assembled(dir.path());
    fs::rename(&mjo_path, sub.join("script.mjo")).unwrap();
    let symbols = write(dir.path(), "symbols.yaml", SYMBOLS);

    let text = stdout(&mjo(["find", "--symbols", p(&symbols), "$00001234,aaaa", p(dir.path())]));
    let expected = "\
sub/script.mjo:
  $00001234
    declaration
    load $0000aaaa AAAA
    store $0000aaaa AAAA
    store $0000aaaa AAAA
";
    assert_eq!(text, expected);

    let text = stdout(&mjo(["find", "beef", p(&sub.join("script.mjo"))]));
    assert_eq!(text, "");
}

#[test]
fn find_rejects_bad_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let output = mjo(["find", "main", p(dir.path())]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error: invalid hash \"main\""), "{stderr}");
}
