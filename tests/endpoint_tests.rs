use endpoint_check::endpoint::{dedup, normalize_line, normalize_lines};

#[test]
fn normalizer_table() {
    let cases = [
        ("1.2.3.4", Some("1.2.3.4:80")),
        ("1.2.3.4:8080", Some("1.2.3.4:8080")),
        ("http://x.com", Some("x.com:80")),
        ("https://x.com", Some("x.com:443")),
        ("https://x.com:8443", Some("x.com:8443")),
        ("bad:port", None),
        ("", None),
        ("   ", None),
    ];
    for (input, expected) in cases {
        let got = normalize_line(input, 80).map(|e| e.canonical());
        assert_eq!(got.as_deref(), expected, "input: {input:?}");
    }
}

#[test]
fn dedup_count_invariant_holds() {
    let lines: Vec<String> = [
        "a:1", "b:2", "a:1", "c:3", "b:2", "b:2", "http://a:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let endpoints = normalize_lines(&lines, 80);
    let input_len = endpoints.len();
    let (unique, duplicates) = dedup(endpoints);

    assert_eq!(unique.len() + duplicates, input_len);
    // "http://a:1" canonicalizes to "a:1" and counts as a duplicate too.
    let canon: Vec<String> = unique.iter().map(|e| e.canonical()).collect();
    assert_eq!(canon, vec!["a:1", "b:2", "c:3"]);
    assert_eq!(duplicates, 4);
}
