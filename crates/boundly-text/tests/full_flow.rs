use boundly_core::types::DocumentChunk;
use boundly_text::TantivyIndex;

#[test]
fn tantivy_full_flow() {
    let tmp = tempfile::tempdir().expect("tmp");
    let index = TantivyIndex::open_or_create(&tmp.path().join("tantivy")).expect("index");

    let topics = ["firecraft kindling tinder", "computer networking routers", "computer science degree"];
    let docs: Vec<_> = topics
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let chunk = DocumentChunk { source: format!("doc{i}.pdf"), page: 1, chunk_index: 0, content: t.to_string() };
            (format!("id-{i}"), chunk)
        })
        .collect();
    assert_eq!(index.add(&docs).expect("add"), 3);

    for q in ["firecraft", "computer", "networking"] {
        let results = index.search(q, 10).expect("search");
        eprintln!("q='{}' -> {} hits", q, results.len());
        assert!(!results.is_empty());
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
    let computer = index.search("computer", 10).expect("search");
    assert_eq!(computer.len(), 2);
}
