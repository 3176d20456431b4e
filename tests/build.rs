use std::fs;
use std::path::Path;

use folio_rs::{BuildError, BuildOptions, Site};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(dir: &Path, rel: &str) -> String {
    fs::read_to_string(dir.join("_site").join(rel)).unwrap()
}

fn academic_site(dir: &Path) {
    write(
        dir,
        "_config.yml",
        "title: Jane Doe\nurl: https://jane.example\nbaseurl: /~jane\ntimezone: Europe/Berlin\ncollections: [publications]\nauthor_email: jane@example.org\n",
    );
    write(
        dir,
        "_layouts/default.html",
        "<html><head><title>{{ page.title }} - {{ site.title }}</title>\
         <link href=\"{{ '/css/main.css' | relative_url }}\"></head>\
         <body>{{ content }}{% include footer.html %}</body></html>",
    );
    write(dir, "_layouts/post.html", "---\nlayout: default\n---\n<h1>{{ page.title }}</h1>{{ content }}");
    write(dir, "_includes/footer.html", "<footer>{{ site.author_email }}</footer>");
    write(
        dir,
        "_posts/2024-03-01-new-paper.md",
        "---\ntitle: New paper out\ntags: [research, ml]\n---\nOur paper on **things**.\n",
    );
    write(
        dir,
        "_posts/2023-11-20-talk.md",
        "---\ntitle: Invited talk\ndate: 2023-11-20 18:00\ntags: [talks]\n---\nSlides soon.\n",
    );
    write(
        dir,
        "_publications/deep-things.md",
        "---\ntitle: Deep Things\nvenue: NeurIPS\n---\nAbstract.\n",
    );
    write(
        dir,
        "index.html",
        "---\nlayout: default\ntitle: Home\n---\n<ul>{% for post in site.posts %}\
         <li><a href=\"{{ post.url | relative_url }}\">{{ post.title }}</a> {{ post.date | date: \"%Y-%m-%d\" }}</li>\
         {% endfor %}</ul>{% for tag in site.tags %}{{ tag[0] }}:{{ tag[1].size }} {% endfor %}",
    );
    write(
        dir,
        "publications.md",
        "---\nlayout: default\ntitle: Publications\npermalink: /publications/\n---\n\
         {% for p in site.publications %}- {{ p.title }} ({{ p.venue }})\n{% endfor %}",
    );
    write(dir, "files/cv.pdf", "%PDF-1.4");
}

fn build(dir: &Path) -> folio_rs::BuildReport {
    Site::new(dir).unwrap().build(&BuildOptions::default()).unwrap()
}

#[test]
fn test_builds_academic_site() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    academic_site(dir);

    let report = build(dir);
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.rendered, 5);
    assert_eq!(report.copied, 1);

    let post = read(dir, "2024/03/01/new-paper-out/index.html");
    assert_eq!(
        post,
        "<html><head><title>New paper out - Jane Doe</title>\
         <link href=\"/~jane/css/main.css\"></head>\
         <body><h1>New paper out</h1><p>Our paper on <strong>things</strong>.</p>\n\
         <footer>jane@example.org</footer></body></html>"
    );

    let index = read(dir, "index.html");
    assert!(index.contains(
        "<li><a href=\"/~jane/2024/03/01/new-paper-out/\">New paper out</a> 2024-03-01</li>\
         <li><a href=\"/~jane/2023/11/20/invited-talk/\">Invited talk</a> 2023-11-20</li>"
    ));
    assert!(index.contains("ml:1 research:1 talks:1 "));

    let publications = read(dir, "publications/index.html");
    assert!(publications.contains("<li>Deep Things (NeurIPS)</li>"));
    assert!(dir.join("_site/publications/deep-things/index.html").exists());
    assert_eq!(read(dir, "files/cv.pdf"), "%PDF-1.4");
}

#[test]
fn test_rebuild_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    academic_site(tmp.path());

    build(tmp.path());
    let first: Vec<String> = ["index.html", "2024/03/01/new-paper-out/index.html", "publications/index.html"]
        .iter()
        .map(|f| read(tmp.path(), f))
        .collect();
    build(tmp.path());
    let second: Vec<String> = ["index.html", "2024/03/01/new-paper-out/index.html", "publications/index.html"]
        .iter()
        .map(|f| read(tmp.path(), f))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_permalink_collision_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write(dir, "a.md", "---\npermalink: /same/\n---\nA");
    write(dir, "b.md", "---\npermalink: /same/\n---\nB");
    write(dir, "c.md", "C");

    let report = build(dir);
    assert!(!report.is_success());
    assert!(report.has_collisions());
    assert_eq!(report.rendered, 0);
    match &report.errors[0] {
        BuildError::PermalinkCollision { path, first, second } => {
            assert_eq!(path, "same/index.html");
            assert_eq!(first, "a.md");
            assert_eq!(second, "b.md");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(!dir.join("_site").exists());
}

#[test]
fn test_invalid_date_is_reported_and_others_built() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write(dir, "_posts/bad.md", "---\ntitle: Bad\ndate: not-a-date\n---\nBad");
    write(dir, "_posts/2024-01-01-good.md", "---\ntitle: Good\n---\nGood");
    write(dir, "list.html", "{% for p in site.posts %}{{ p.title }};{% endfor %}");

    let report = build(dir);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(
        &report.errors[0],
        BuildError::InvalidDate { source_id, value } if source_id == "_posts/bad.md" && value == "not-a-date"
    ));
    assert_eq!(report.rendered, 2);
    assert_eq!(read(dir, "list.html"), "Good;");
    assert!(dir.join("_site/2024/01/01/good/index.html").exists());
}

#[test]
fn test_malformed_front_matter_is_reported() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write(dir, "broken.md", "---\ntitle: [unclosed\n---\nbody");
    write(dir, "fine.md", "fine");

    let report = build(dir);
    assert_eq!(report.rendered, 1);
    assert!(matches!(
        &report.errors[0],
        BuildError::MalformedMetadata { source_id, .. } if source_id == "broken.md"
    ));
}

#[test]
fn test_drafts_only_with_flag() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    write(dir, "_posts/2024-05-05-wip.md", "---\ntitle: WIP\npublished: false\n---\nsoon");

    let site = Site::new(dir).unwrap();
    let report = site.build(&BuildOptions::default()).unwrap();
    assert_eq!(report.rendered, 0);

    let report = site
        .build(&BuildOptions {
            drafts: true,
            clean: true,
        })
        .unwrap();
    assert_eq!(report.rendered, 1);
    assert!(dir.join("_site/2024/05/05/wip/index.html").exists());
}
