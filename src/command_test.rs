use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_default_sequence_is_get_detect_finalize() {
    let config = CrawlConfig::default();
    let commands = config.command_sequence("http://www.example.com");
    assert_eq!(
        commands,
        vec![
            Command::GetPage {
                url: "http://www.example.com".to_string(),
                sleep: 3,
            },
            Command::DetectDarkPatterns {
                languages: vec!["nl".to_string(), "en".to_string()],
            },
            Command::Finalize { sleep: 5 },
        ]
    );
}

#[test]
fn test_browse_replaces_get_page() {
    let config = CrawlConfig {
        browse: true,
        num_links: 5,
        ..CrawlConfig::default()
    };
    let commands = config.command_sequence("http://www.example.com");
    assert_eq!(
        commands[0],
        Command::Browse {
            url: "http://www.example.com".to_string(),
            num_links: 5,
            sleep: 3,
        }
    );
}

#[test]
fn test_full_sequence_order() {
    let config = CrawlConfig {
        screenshot: true,
        full_page_screenshot: true,
        dump_source: true,
        recursive_dump_source: true,
        ping_cmp: true,
        detect_cookie_dialog: true,
        ..CrawlConfig::default()
    };
    let commands = config.command_sequence("http://www.example.com");
    let shape: Vec<&str> = commands
        .iter()
        .map(|command| match command {
            Command::GetPage { .. } => "get",
            Command::Browse { .. } => "browse",
            Command::SaveScreenshot { .. } => "screenshot",
            Command::ScreenshotFullPage { .. } => "screenshot_full_page",
            Command::DumpPageSource { .. } => "dump_source",
            Command::RecursiveDumpPageSource { .. } => "recursive_dump_source",
            Command::DetectDarkPatterns { .. } => "detect_dark_patterns",
            Command::PingCmp => "ping_cmp",
            Command::DetectCookieDialog => "detect_cookie_dialog",
            Command::Finalize { .. } => "finalize",
        })
        .collect();
    assert_eq!(
        shape,
        vec![
            "get",
            "screenshot",
            "screenshot_full_page",
            "dump_source",
            "recursive_dump_source",
            "detect_dark_patterns",
            "ping_cmp",
            "detect_cookie_dialog",
            "finalize",
        ]
    );
}

#[test]
fn test_command_wire_format() {
    let get = serde_json::to_string(&Command::GetPage {
        url: "http://www.example.com".to_string(),
        sleep: 3,
    })
    .unwrap();
    assert_eq!(
        get,
        r#"{"command":"get_page","url":"http://www.example.com","sleep":3}"#
    );

    let ping = serde_json::to_string(&Command::PingCmp).unwrap();
    assert_eq!(ping, r#"{"command":"ping_cmp"}"#);

    let parsed: Command =
        serde_json::from_str(r#"{"command":"detect_dark_patterns","languages":["nl"]}"#).unwrap();
    assert_eq!(
        parsed,
        Command::DetectDarkPatterns {
            languages: vec!["nl".to_string()],
        }
    );
}

#[test]
fn test_normalized_host_folds_case_and_www() {
    let bare = Url::parse("http://example.com/a").unwrap();
    let www = Url::parse("http://www.EXAMPLE.com/b?x=1").unwrap();
    assert_eq!(normalized_host(&bare), "example.com");
    assert_eq!(normalized_host(&www), "example.com");
    assert_eq!(normalized_host(&bare), normalized_host(&www));
}

#[test]
fn test_normalized_host_distinguishes_other_sites() {
    let page = Url::parse("http://www.example.com/").unwrap();
    let other = Url::parse("http://tracker.net/").unwrap();
    let subdomain = Url::parse("http://shop.example.com/").unwrap();
    assert_ne!(normalized_host(&page), normalized_host(&other));
    assert_ne!(normalized_host(&page), normalized_host(&subdomain));
}

#[test]
fn test_normalized_host_empty_without_host() {
    let mailto = Url::parse("mailto:test@example.com").unwrap();
    assert_eq!(normalized_host(&mailto), "");
}

#[test]
fn test_data_paths_hang_off_the_data_dir() {
    let config = CrawlConfig {
        data_dir: PathBuf::from("/tmp/crawl"),
        ..CrawlConfig::default()
    };
    assert_eq!(
        config.database_path(),
        PathBuf::from("/tmp/crawl/crawl-data.sqlite")
    );
    assert_eq!(
        config.screenshot_dir(),
        PathBuf::from("/tmp/crawl/screenshots")
    );
    assert_eq!(config.sources_dir(), PathBuf::from("/tmp/crawl/sources"));
}
