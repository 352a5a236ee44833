fn run(args: &[&str]) -> std::process::Output {
    let bin = assert_cmd::cargo::cargo_bin!("opus-mcp");
    std::process::Command::new(bin)
        .args(args)
        .env("OPUS_MCP_DOTENV", "0")
        .output()
        .expect("run opus-mcp parse-category")
}

#[test]
fn parse_category_json_contract() {
    let out = run(&["parse-category", "cs.AI or (cs.LG not cs.CV)"]);
    assert!(out.status.success());
    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("parse-category prints json");
    assert_eq!(v["kind"].as_str(), Some("parse_category"));
    assert_eq!(
        v["search_query"].as_str(),
        Some("(cat:cs.AI+OR+(cat:cs.LG+NOT+cat:cs.CV))")
    );
}

#[test]
fn parse_category_text_contract() {
    let out = run(&["parse-category", "--output", "text", "math.AG  stat.ML"]);
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        "(cat:math.AG+AND+cat:stat.ML)"
    );
}

#[test]
fn parse_category_empty_fails() {
    let out = run(&["parse-category", "   "]);
    assert_eq!(out.status.code(), Some(2));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json on failure");
    assert_eq!(v["ok"].as_bool(), Some(false));
    assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));
}
