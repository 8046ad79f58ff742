//! End-to-end orchestration: document analysis, outline extraction and
//! persona-driven ranking runs.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::classify::{detect_headings, HeadingClassifier};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hierarchy::{DocumentGeometry, HierarchyAssigner};
use crate::merge::SpanMerger;
use crate::model::{
    ExtractedSection, Heading, Metadata, Outline, RankingOutput, Request, Run, Section,
};
use crate::nlp::{EmbeddingModel, GrammaticalAnalyzer, LexicalAnalyzer};
use crate::outline::{build_outline, document_title};
use crate::rank::RelevanceRanker;
use crate::segment::{segment, LeveledRun};
use crate::source::{LopdfSource, SourceDocument, SpanSource};

const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

/// Everything derived from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnalysis {
    pub name: String,
    pub title: String,
    /// Merged runs of every page, in reading order.
    pub runs: Vec<Run>,
    /// Runs accepted by the classifier, before front-matter exclusion.
    pub candidates: Vec<Run>,
    pub headings: Vec<Heading>,
    pub sections: Vec<Section>,
}

pub struct Pipeline {
    config: Config,
    source: Box<dyn SpanSource>,
    analyzer: Box<dyn GrammaticalAnalyzer>,
    /// Required by the semantic and hybrid strategies. Without one they
    /// fail with [`Error::Model`].
    embedder: Option<Box<dyn EmbeddingModel>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            source: Box::new(LopdfSource),
            analyzer: Box::new(LexicalAnalyzer),
            embedder: None,
        }
    }

    pub fn with_source(mut self, source: Box<dyn SpanSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Box<dyn GrammaticalAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_embedder(mut self, embedder: Box<dyn EmbeddingModel>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyze(&self, path: &Path) -> Result<DocumentAnalysis> {
        if !path.is_file() {
            return Err(Error::MissingDocument(path.to_path_buf()));
        }
        let document = self.source.load(path)?;
        let fallback = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled")
            .to_string();
        self.analyze_document(&document, &fallback)
    }

    /// Merge, classify, level and segment an already loaded document.
    pub fn analyze_document(
        &self,
        document: &SourceDocument,
        fallback_title: &str,
    ) -> Result<DocumentAnalysis> {
        let merger = SpanMerger::new(&self.config.merge);
        let classifier = HeadingClassifier::new(&self.config.headings, self.analyzer.as_ref());

        let mut runs = Vec::new();
        let mut body = Vec::new();
        let mut candidates = Vec::new();
        let mut title = fallback_title.to_string();

        for page in &document.pages {
            let page_runs = merger.merge(&page.spans);
            debug!(
                "{}: page {} merged {} spans into {} runs",
                document.name,
                page.number,
                page.spans.len(),
                page_runs.len()
            );
            if page.number == 1 {
                title = document_title(&page_runs, fallback_title);
            }
            let page_headings = detect_headings(&page_runs, &classifier, &self.config.headings)?;
            body.extend(page_headings.body(&page_runs).cloned());
            candidates.extend(page_headings.headings);
            runs.extend(page_runs);
        }

        let geometry = DocumentGeometry {
            page_count: document.page_count(),
            first_page_height: document
                .pages
                .first()
                .map_or(DEFAULT_PAGE_HEIGHT, |p| p.height),
        };
        let levels = HierarchyAssigner::new(&self.config.hierarchy).levels(&candidates, &geometry);

        let anchors: Vec<LeveledRun> = candidates
            .iter()
            .zip(&levels)
            .map(|(run, level)| LeveledRun {
                run: run.clone(),
                level: *level,
            })
            .collect();
        let headings: Vec<Heading> = anchors
            .iter()
            .filter_map(|a| {
                a.level.map(|level| Heading {
                    run: a.run.clone(),
                    level,
                })
            })
            .collect();
        let sections = segment(&document.name, &body, &anchors);

        info!(
            "{}: {} pages, {} headings, {} sections",
            document.name,
            document.page_count(),
            headings.len(),
            sections.len()
        );

        Ok(DocumentAnalysis {
            name: document.name.clone(),
            title,
            runs,
            candidates,
            headings,
            sections,
        })
    }

    pub fn outline(&self, path: &Path) -> Result<Outline> {
        let analysis = self.analyze(path)?;
        Ok(build_outline(analysis.title, &analysis.headings))
    }

    /// Write `<stem>.json` into `output_dir` for every PDF in `input_dir`.
    /// Documents that cannot be read are skipped. Returns the number written.
    pub fn outline_dir(&self, input_dir: &Path, output_dir: &Path) -> Result<usize> {
        fs::create_dir_all(output_dir)?;

        let pdfs = pdf_files(input_dir)?;
        let outlines = pdfs
            .par_iter()
            .map(|path| match self.outline(path) {
                Ok(outline) => Ok(Some((path.clone(), outline))),
                Err(e) if e.is_recoverable() => {
                    warn!("skipping {}: {}", path.display(), e);
                    Ok(None)
                }
                Err(e) => Err(e),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut written = 0;
        for (path, outline) in outlines.into_iter().flatten() {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
            write_json(&output_dir.join(format!("{}.json", stem)), &outline)?;
            written += 1;
        }
        info!("wrote {} of {} outlines", written, pdfs.len());
        Ok(written)
    }

    /// Rank the sections of every requested document in `input_dir`.
    pub fn rank(&self, input_dir: &Path, request: &Request) -> Result<RankingOutput> {
        let per_document = request
            .documents
            .par_iter()
            .map(|doc| {
                let path = input_dir.join(&doc.filename);
                match self.analyze(&path) {
                    Ok(analysis) => Ok(analysis.sections),
                    Err(e) if e.is_recoverable() => {
                        warn!("skipping {}: {}", doc.filename, e);
                        Ok(Vec::new())
                    }
                    Err(e) => Err(e),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let sections: Vec<Section> = per_document.into_iter().flatten().collect();

        let persona = request.persona.role.as_str();
        let job = request.job_to_be_done.task.as_str();
        let mut ranker = RelevanceRanker::new(&self.config.ranking);
        if let Some(embedder) = &self.embedder {
            ranker = ranker.with_embedder(embedder.as_ref());
        }
        let ranked = ranker.rank(&sections, persona, job, self.config.ranking.top_n)?;
        let sub_sections = ranker.refine(&ranked);
        info!(
            "ranked {} sections, kept {}",
            sections.len(),
            ranked.len()
        );

        Ok(RankingOutput {
            metadata: Metadata {
                input_documents: request.documents.iter().map(|d| d.filename.clone()).collect(),
                persona: persona.to_string(),
                job_to_be_done: job.to_string(),
                processing_timestamp: timestamp(),
            },
            extracted_sections: ranked.iter().map(ExtractedSection::from).collect(),
            sub_section_analysis: sub_sections,
        })
    }
}

pub fn load_request(path: &Path) -> Result<Request> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Input(format!("cannot read request {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Input(format!("malformed request {}: {}", path.display(), e)))
}

/// Serialize fully before touching the file so a failed run leaves no
/// partial output.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if path.is_file() && is_pdf {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
