use profile::{read_token, Profile, ProfileWriter};

#[test]
fn parses_sections_comments_and_entries() {
    let text = "\
# leading comment
global = 1

[DAQ2]
dds_mode = 1
 axi-ad9144-hpc.out_altvoltage0_1A_frequency =  2000000
; another comment
[Other]
key=value
";
    let profile = Profile::parse(text);
    assert_eq!(profile.entries().len(), 4);
    assert_eq!(profile.get("", "global"), Some("1"));
    assert_eq!(profile.get("DAQ2", "dds_mode"), Some("1"));
    assert_eq!(
        profile.get("DAQ2", "axi-ad9144-hpc.out_altvoltage0_1A_frequency"),
        Some("2000000")
    );
    assert_eq!(profile.get("Other", "key"), Some("value"));
    assert_eq!(profile.get("DAQ2", "key"), None);
    assert_eq!(profile.section("DAQ2").count(), 2);
    assert_eq!(profile.entries()[1].line, 5);
}

#[test]
fn malformed_lines_are_skipped() {
    let profile: Profile = "[A\nnot a pair\n= orphan\n[B]\nok = yes\n".parse().unwrap();
    assert_eq!(profile.entries().len(), 1);
    assert_eq!(profile.get("B", "ok"), Some("yes"));
}

#[test]
fn last_occurrence_wins() {
    let profile = Profile::parse("[S]\nk = 1\n[T]\nk = 9\n[S]\nk = 2\n");
    assert_eq!(profile.get("S", "k"), Some("2"));
    assert!(profile.has_section("T"));
    assert!(!profile.has_section("U"));
}

#[test]
fn values_keep_inner_equals_signs() {
    let profile = Profile::parse("[S]\npath = /tmp/a=b.bin\n");
    assert_eq!(profile.get("S", "path"), Some("/tmp/a=b.bin"));
}

#[test]
fn writer_appends_without_truncating() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.ini");
    std::fs::write(&path, "[Keep]\nold = 1\n").unwrap();

    let mut writer = ProfileWriter::append(&path).unwrap();
    writer.section("DAQ2").unwrap();
    writer.entry("dds_mode", "4").unwrap();
    writer.finish().unwrap();

    let profile = Profile::load(&path).unwrap();
    assert_eq!(profile.get("Keep", "old"), Some("1"));
    assert_eq!(profile.get("DAQ2", "dds_mode"), Some("4"));
    assert_eq!(
        read_token(&path, "DAQ2", "dds_mode").unwrap().as_deref(),
        Some("4")
    );
    assert!(read_token(&path, "DAQ2", "missing").unwrap().is_none());
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Profile::load(dir.path().join("absent.ini")).is_err());
}
