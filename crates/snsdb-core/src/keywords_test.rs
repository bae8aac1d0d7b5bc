use std::path::Path;

use super::*;

const SAMPLE: &str = r"
platforms:
  instagram:
    keywords: [' グルメ ', コスメ]
  x:
    keywords_per_run: 2
    keywords:
      - 旅行
";

#[test]
fn parses_and_trims_pools() {
    let file = parse_keyword_pools(SAMPLE).unwrap();
    let ig = file.pool(Platform::Instagram).unwrap();
    assert_eq!(ig.keywords, vec!["グルメ".to_string(), "コスメ".to_string()]);
    assert_eq!(ig.per_run(5), 5);
    assert_eq!(file.pool(Platform::X).unwrap().per_run(5), 2);
    assert!(file.pool(Platform::Tiktok).is_none());
    assert_eq!(file.platforms(), vec![Platform::Instagram, Platform::X]);
}

#[test]
fn empty_pool_is_rejected() {
    let yaml = "platforms:\n  tiktok:\n    keywords: []\n";
    let result = parse_keyword_pools(yaml);
    assert!(matches!(result, Err(ConfigError::Validation(ref m)) if m.contains("tiktok")));
}

#[test]
fn duplicate_keywords_are_rejected_case_insensitively() {
    let yaml = "platforms:\n  x:\n    keywords: [Vlog, vlog]\n";
    let result = parse_keyword_pools(yaml);
    assert!(matches!(result, Err(ConfigError::Validation(ref m)) if m.contains("duplicate")));
}

#[test]
fn blank_keyword_is_rejected() {
    let yaml = "platforms:\n  x:\n    keywords: ['  ']\n";
    assert!(matches!(
        parse_keyword_pools(yaml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn unknown_platform_is_a_parse_error() {
    let yaml = "platforms:\n  myspace:\n    keywords: [a]\n";
    assert!(matches!(
        parse_keyword_pools(yaml),
        Err(ConfigError::KeywordsFileParse(_))
    ));
}

#[test]
fn zero_per_run_override_is_rejected() {
    let yaml = "platforms:\n  x:\n    keywords_per_run: 0\n    keywords: [a]\n";
    assert!(matches!(
        parse_keyword_pools(yaml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn missing_file_reports_path() {
    let result = load_keyword_pools(Path::new("/nonexistent/keywords.yaml"));
    assert!(
        matches!(result, Err(ConfigError::KeywordsFileIo { ref path, .. }) if path.contains("nonexistent"))
    );
}

#[test]
fn repository_keywords_file_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/keywords.yaml");
    let file = load_keyword_pools(&path).unwrap();
    assert_eq!(file.platforms().len(), 3);
}
