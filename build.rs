use std::fs;
use std::path::Path;

const SRC_DIR: &str = "web/src";
const DIST_DIR: &str = "web/dist";

/// Placeholders in `index.html` and the files spliced into them.
const INLINED: &[(&str, &str)] = &[("{{STYLES}}", "styles.css"), ("{{SCRIPTS}}", "app.js")];

fn main() {
    let src = Path::new(SRC_DIR);
    let dist = Path::new(DIST_DIR);

    println!("cargo:rerun-if-changed={SRC_DIR}/index.html");
    let mut page = fs::read_to_string(src.join("index.html"))
        .unwrap_or_else(|e| panic!("reading {SRC_DIR}/index.html: {e}"));

    for (placeholder, file) in INLINED {
        println!("cargo:rerun-if-changed={SRC_DIR}/{file}");
        assert!(
            page.contains(placeholder),
            "{SRC_DIR}/index.html is missing {placeholder}"
        );
        let body = fs::read_to_string(src.join(file))
            .unwrap_or_else(|e| panic!("reading {SRC_DIR}/{file}: {e}"));
        page = page.replace(placeholder, &body);
    }

    fs::create_dir_all(dist).unwrap_or_else(|e| panic!("creating {DIST_DIR}: {e}"));
    fs::write(dist.join("index.html"), page)
        .unwrap_or_else(|e| panic!("writing {DIST_DIR}/index.html: {e}"));
}
