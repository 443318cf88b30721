//! Benchmarks for segmentation and mention grouping.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lexicon::consolidate::group_mentions;
use lexicon::model::{EntityKind, Gender, Mention, MentionRecord, Religion};
use lexicon::segment::segment_chapter;

/// A synthetic chapter of `n` articles, each a few paragraphs long.
fn chapter(n: usize) -> String {
    let mut text = String::from("ПРЕДИСЛОВИЕ\nвступление\n");
    for i in 0..n {
        text.push_str(&format!("\n\n     СТАТЬЯ-{i} (IX век) - пояснение\n"));
        for p in 0..5 {
            text.push_str(&format!(
                "Абзац {p} статьи {i}, в котором\n     УПОМИНАЕТСЯ кто-то без пустых строк.\n\n"
            ));
        }
    }
    text
}

fn mentions(n: usize) -> Vec<Mention> {
    (0..n)
        .map(|i| Mention {
            article: format!("14-red/{:02}-СТАТЬЯ", i % 120).into(),
            record: MentionRecord {
                name: if i % 2 == 0 {
                    format!("Персонаж {}", i % 300)
                } else {
                    format!(" персонаж {} ", i % 300)
                },
                aliases: Default::default(),
                kind: EntityKind::Person,
                epoch: None,
                gender: Gender::Unknown,
                religion: Religion::Unknown,
                description: String::new(),
                quote: String::new(),
            },
        })
        .collect()
}

fn bench_segment(c: &mut Criterion) {
    let text = chapter(120);
    c.bench_function("segment_120_articles", |bench| {
        bench.iter(|| black_box(segment_chapter("14-red", &text)))
    });
}

fn bench_group(c: &mut Criterion) {
    let input = mentions(2000);
    c.bench_function("group_2000_mentions", |bench| {
        bench.iter(|| black_box(group_mentions(input.clone())))
    });
}

criterion_group!(benches, bench_segment, bench_group);
criterion_main!(benches);
