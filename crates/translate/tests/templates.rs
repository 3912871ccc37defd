//! Template resolution and translation of real-looking labels.

use cube_common::{ErrorKind, Preferences};
use label::{pvl, Traverse};
use std::fs;
use test_utils::temp_test_dir;
use translate::{TemplateSource, TemplateStore, Translator};

const PDS3_LABEL: &str = r#"PDS_VERSION_ID = PDS3
SPACECRAFT_NAME = "CASSINI_ORBITER"
INSTRUMENT_ID = ISSNA
TARGET_NAME = SATURN
START_TIME = 2004-06-11T19:32:02.711
EXPOSURE_DURATION = 1.25 <SECONDS>
DATA_SET_ID = "CO-S-ISSNA-2-EDR-V1.0"
OBJECT = IMAGE
  FILTER_NAME = (CL1, GRN)
END_OBJECT = IMAGE
END
"#;

#[test]
fn test_pds3_translation() {
    let source = pvl::parse(PDS3_LABEL).unwrap();
    let store = TemplateStore::bundled().unwrap();
    let groups = Translator::translate(&source, store.get("pds3").unwrap()).unwrap();
    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["Instrument", "BandBin", "Archive"]);

    let inst = &groups[0];
    assert_eq!(
        inst.keyword_value("SpacecraftName", Traverse::CurrentLevel).unwrap(),
        "Cassini-Huygens"
    );
    let exposure = inst.keyword("ExposureDuration", Traverse::CurrentLevel).unwrap();
    assert_eq!(exposure.value(0).unwrap(), "1.25");
    assert_eq!(exposure.unit(0).unwrap(), Some("SECONDS"));

    let filters = groups[1].keyword("FilterName", Traverse::CurrentLevel).unwrap();
    assert_eq!(filters.len(), 2);
    assert_eq!(filters.value(1).unwrap(), "GRN");
}

#[test]
fn test_explicit_directory_overrides_bundled() {
    let dir = temp_test_dir();
    fs::create_dir_all(dir.path().join("nested")).unwrap();
    fs::write(
        dir.path().join("nested/pds3.yaml"),
        "name: pds3\ngroups:\n  - name: Kernels\n    keywords:\n      - output: Target\n        input_key: TARGET_NAME\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not a template").unwrap();

    let store = TemplateStore::resolve(Some(dir.path()), &Preferences::default()).unwrap();
    assert_eq!(store.source(), &TemplateSource::Explicit(dir.path().to_path_buf()));
    assert_eq!(store.get("pds3").unwrap().groups[0].name, "Kernels");
    assert!(store.get("fits").is_ok());
}

#[test]
fn test_preferences_directory_is_second_choice() {
    let dir = temp_test_dir();
    fs::write(
        dir.path().join("mine.yml"),
        "name: mine\ngroups: []\n",
    )
    .unwrap();
    let prefs = Preferences {
        template_dir: Some(dir.path().to_path_buf()),
        ..Preferences::default()
    };
    let store = TemplateStore::resolve(None, &prefs).unwrap();
    assert_eq!(store.source(), &TemplateSource::Preferences(dir.path().to_path_buf()));
    assert!(store.get("mine").is_ok());

    let bundled = TemplateStore::resolve(None, &Preferences::default()).unwrap();
    assert_eq!(bundled.source(), &TemplateSource::Bundled);
}

#[test]
fn test_missing_directory_and_bad_template() {
    let dir = temp_test_dir();
    let err = TemplateStore::from_dir(&dir.path().join("absent")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);

    fs::write(dir.path().join("broken.yaml"), "name: [unterminated").unwrap();
    let err = TemplateStore::from_dir(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}
