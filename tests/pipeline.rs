use std::fs;
use std::path::Path;

use adobe1b::config::Strategy;
use adobe1b::model::{DocumentRef, JobToBeDone, Persona, RankingOutput};
use adobe1b::{
    load_request, write_json, Config, Error, HashingEmbedder, Outline, Pipeline, Request,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

/// One BT/ET text object: a font, a starting point and its lines.
struct Block {
    bold: bool,
    size: i64,
    x: i64,
    y: i64,
    lines: &'static [&'static str],
}

fn block(bold: bool, size: i64, y: i64, lines: &'static [&'static str]) -> Block {
    Block {
        bold,
        size,
        x: 72,
        y,
        lines,
    }
}

fn build_pdf(path: &Path, pages: &[Vec<Block>]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for blocks in pages {
        let mut operations = Vec::new();
        for b in blocks {
            let font = if b.bold { "F2" } else { "F1" };
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.into(), b.size.into()]));
            operations.push(Operation::new("Td", vec![b.x.into(), b.y.into()]));
            for (i, line) in b.lines.iter().enumerate() {
                if i > 0 {
                    operations.push(Operation::new("Td", vec![0.into(), (-(b.size + 2)).into()]));
                }
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            }
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn travel_guide(path: &Path) {
    build_pdf(
        path,
        &[
            vec![
                block(true, 24, 720, &["South of France Travel Guide"]),
                block(true, 14, 660, &["Coastal Adventures"]),
                block(
                    false,
                    10,
                    640,
                    &[
                        "The coastline offers sandy beaches and clear water.",
                        "College friends can rent kayaks for 3 days of fun.",
                        "Group discounts apply for parties of 10 or more.",
                    ],
                ),
                block(true, 14, 560, &["Nightlife and Entertainment"]),
                block(
                    false,
                    10,
                    540,
                    &[
                        "Bars in Nice stay open late on weekends.",
                        "Clubs in Cannes host famous DJs every summer.",
                    ],
                ),
                block(true, 14, 300, &["Getting Around"]),
                block(
                    false,
                    10,
                    280,
                    &["Trains connect Marseille, Nice and Avignon every hour."],
                ),
            ],
            vec![
                block(true, 14, 720, &["Culinary Experiences"]),
                block(
                    false,
                    10,
                    700,
                    &[
                        "Cooking classes teach local recipes with fresh herbs.",
                        "Wine tastings run every afternoon in the hills.",
                    ],
                ),
                block(true, 14, 560, &["Table of Contents"]),
                block(
                    false,
                    10,
                    540,
                    &["Plan a trip for college friends over 10 days as a group"],
                ),
            ],
        ],
    );
}

fn request(documents: &[&str]) -> Request {
    Request {
        persona: Persona {
            role: "Travel Planner".to_string(),
        },
        job_to_be_done: JobToBeDone {
            task: "Plan a trip of 4 days for a group of 10 college friends.".to_string(),
        },
        documents: documents
            .iter()
            .map(|f| DocumentRef {
                filename: f.to_string(),
                title: None,
            })
            .collect(),
    }
}

#[test]
fn test_outline_from_generated_pdf() {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("south_of_france.pdf");
    travel_guide(&pdf);

    let outline = Pipeline::default().outline(&pdf).unwrap();
    assert_eq!(outline.title, "South of France Travel Guide");

    let entries: Vec<(&str, &str, usize)> = outline
        .outline
        .iter()
        .map(|e| (e.level.as_str(), e.text.as_str(), e.page))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("H1", "South of France Travel Guide", 0),
            ("H2", "Coastal Adventures", 0),
            ("H2", "Nightlife and Entertainment", 0),
            ("H2", "Getting Around", 0),
            ("H2", "Culinary Experiences", 1),
            ("H2", "Table of Contents", 1),
        ]
    );
}

#[test]
fn test_analysis_sections_follow_headings() {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("south_of_france.pdf");
    travel_guide(&pdf);

    let analysis = Pipeline::default().analyze(&pdf).unwrap();
    let coastal = analysis
        .sections
        .iter()
        .find(|s| s.title == "Coastal Adventures")
        .unwrap();
    assert_eq!(
        coastal.content,
        "The coastline offers sandy beaches and clear water. \
         College friends can rent kayaks for 3 days of fun. \
         Group discounts apply for parties of 10 or more."
    );
    assert_eq!(coastal.level, Some(2));

    let around = analysis
        .sections
        .iter()
        .find(|s| s.title == "Getting Around")
        .unwrap();
    assert_eq!((around.page_start, around.page_end), (1, 2));
    assert_eq!(
        around.content,
        "Trains connect Marseille, Nice and Avignon every hour."
    );
}

#[test]
fn test_outline_directory_mode() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    travel_guide(&input.path().join("guide.pdf"));
    build_pdf(
        &input.path().join("notes.pdf"),
        &[vec![block(true, 18, 700, &["Packing Essentials"])]],
    );
    fs::write(input.path().join("readme.txt"), "not a pdf").unwrap();
    fs::write(input.path().join("broken.pdf"), "not a pdf either").unwrap();

    let written = Pipeline::default()
        .outline_dir(input.path(), output.path())
        .unwrap();
    assert_eq!(written, 2);

    let notes: Outline =
        serde_json::from_str(&fs::read_to_string(output.path().join("notes.json")).unwrap())
            .unwrap();
    assert_eq!(notes.title, "Packing Essentials");
    assert_eq!(notes.outline.len(), 1);
    assert!(output.path().join("guide.json").exists());
    assert!(!output.path().join("broken.json").exists());
}

#[test]
fn test_ranking_end_to_end() {
    let dir = TempDir::new().unwrap();
    travel_guide(&dir.path().join("south_of_france.pdf"));
    fs::write(dir.path().join("corrupt.pdf"), "%PDF-1.4 garbage").unwrap();

    let request = request(&["south_of_france.pdf", "missing.pdf", "corrupt.pdf"]);
    let output = Pipeline::default().rank(dir.path(), &request).unwrap();

    assert_eq!(
        output.metadata.input_documents,
        vec!["south_of_france.pdf", "missing.pdf", "corrupt.pdf"]
    );
    assert_eq!(output.metadata.persona, "Travel Planner");

    let top = &output.extracted_sections[0];
    assert_eq!(top.section_title, "Coastal Adventures");
    assert_eq!(top.page_number, 1);
    assert_eq!(top.importance_rank, 1);
    assert!(output
        .extracted_sections
        .iter()
        .all(|s| s.section_title != "Table of Contents"));

    let ranks: Vec<usize> = output
        .extracted_sections
        .iter()
        .map(|s| s.importance_rank)
        .collect();
    assert_eq!(ranks, (1..=ranks.len()).collect::<Vec<_>>());

    let first = &output.sub_section_analysis[0];
    assert_eq!(first.section_title, "Coastal Adventures");
    assert!(first.refined_text.starts_with("The coastline offers sandy beaches"));
}

#[test]
fn test_ranking_is_deterministic_across_strategies() {
    let dir = TempDir::new().unwrap();
    travel_guide(&dir.path().join("south_of_france.pdf"));
    let request = request(&["south_of_france.pdf"]);

    for strategy in [Strategy::Lexical, Strategy::Semantic, Strategy::Hybrid] {
        let mut config = Config::default();
        config.ranking.strategy = strategy;
        config.ranking.min_passage_words = 5;
        let pipeline = Pipeline::new(config).with_embedder(Box::new(HashingEmbedder::default()));

        let first = pipeline.rank(dir.path(), &request).unwrap();
        let second = pipeline.rank(dir.path(), &request).unwrap();
        assert_eq!(first.extracted_sections, second.extracted_sections);
        assert_eq!(first.sub_section_analysis, second.sub_section_analysis);
        assert!(!first.extracted_sections.is_empty());
    }
}

#[test]
fn test_request_and_output_files() {
    let dir = TempDir::new().unwrap();
    travel_guide(&dir.path().join("south_of_france.pdf"));
    fs::write(
        dir.path().join("input.json"),
        r#"{
            "challenge_info": {"challenge_id": "round_1b_002", "test_case_name": "travel_planner"},
            "documents": [{"filename": "south_of_france.pdf", "title": "South of France"}],
            "persona": {"role": "Travel Planner"},
            "job_to_be_done": {"task": "Plan a trip of 4 days for a group of 10 college friends."}
        }"#,
    )
    .unwrap();

    let request = load_request(&dir.path().join("input.json")).unwrap();
    let output = Pipeline::default().rank(dir.path(), &request).unwrap();
    let out_path = dir.path().join("output.json");
    write_json(&out_path, &output).unwrap();

    let raw = fs::read_to_string(&out_path).unwrap();
    assert!(raw.contains("\n  \"metadata\""));
    let parsed: RankingOutput = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, output);

    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    for key in ["metadata", "extracted_sections", "sub_section_analysis"] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_semantic_strategy_without_model_fails() {
    let dir = TempDir::new().unwrap();
    travel_guide(&dir.path().join("south_of_france.pdf"));

    let mut config = Config::default();
    config.ranking.strategy = Strategy::Hybrid;
    let err = Pipeline::new(config)
        .rank(dir.path(), &request(&["south_of_france.pdf"]))
        .unwrap_err();
    assert!(matches!(err, Error::Model(_)));
}

#[test]
fn test_wrapped_title_is_not_section_content() {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("cities.pdf");
    build_pdf(
        &pdf,
        &[vec![
            block(true, 20, 700, &["A Comprehensive Guide to"]),
            block(true, 20, 678, &["Major Cities of France"]),
            block(
                false,
                10,
                640,
                &["The south is sunny and the coast is long and warm."],
            ),
        ]],
    );

    let analysis = Pipeline::default().analyze(&pdf).unwrap();
    assert_eq!(analysis.sections.len(), 1);
    assert_eq!(
        analysis.sections[0].title,
        "A Comprehensive Guide to Major Cities of France"
    );
    assert_eq!(
        analysis.sections[0].content,
        "The south is sunny and the coast is long and warm."
    );
}

#[test]
fn test_missing_document_for_outline() {
    let dir = TempDir::new().unwrap();
    let err = Pipeline::default()
        .outline(&dir.path().join("absent.pdf"))
        .unwrap_err();
    assert!(matches!(err, Error::MissingDocument(_)));
}
