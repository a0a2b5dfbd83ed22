//! Web-root selection
//!
//! Decides whether a repository's site lives at the top level or inside one
//! conventional subdirectory. Pure and deterministic: the same path list
//! always produces the same decision.

use serde::Serialize;

/// Extensions that make a file part of a static site
pub const WEB_EXTENSIONS: &[&str] = &[".html", ".htm", ".css", ".js"];

/// Folder names considered as web roots, in tie-break order
pub const CANDIDATE_FOLDERS: &[&str] = &[
    "src", "public", "dist", "build", "www", "web", "app", "client", "frontend", "site", "docs",
];

const INDEX_BONUS: i64 = 10;
const CSS_BONUS: i64 = 3;
const JS_BONUS: i64 = 3;
const DEPTH_ALLOWANCE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebRootMode {
    Root,
    Subfolder,
    None,
}

/// Which files to deploy and where they are rooted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebRootDecision {
    pub mode: WebRootMode,
    /// Folder to strip from paths; empty for `Root` and `None`
    pub prefix: String,
    /// Subsequence of the input paths
    pub selected_files: Vec<String>,
}

impl WebRootDecision {
    fn root(file_paths: &[String]) -> Self {
        Self {
            mode: WebRootMode::Root,
            prefix: String::new(),
            selected_files: file_paths.to_vec(),
        }
    }

    fn none() -> Self {
        Self {
            mode: WebRootMode::None,
            prefix: String::new(),
            selected_files: Vec::new(),
        }
    }

    /// Human-readable name of the deployment source
    pub fn source_label(&self) -> String {
        match self.mode {
            WebRootMode::Subfolder => format!("/{}/", self.prefix),
            _ => "root".to_string(),
        }
    }
}

/// Score breakdown for one candidate folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderCandidate {
    pub folder: String,
    pub web_file_count: usize,
    pub has_index: bool,
    pub has_css: bool,
    pub has_js: bool,
    pub max_depth: usize,
    pub score: i64,
}

/// Full reasoning behind a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebRootAnalysis {
    pub root_web_files: Vec<String>,
    pub has_root_index: bool,
    /// Scored folders in candidate-list order
    pub ranking: Vec<FolderCandidate>,
    pub decision: WebRootDecision,
}

impl WebRootAnalysis {
    /// One-line explanation for logs and status output
    pub fn summary(&self) -> String {
        match self.decision.mode {
            WebRootMode::Root if self.has_root_index => {
                "Root directory contains index.html (and possibly other web files)".to_string()
            }
            WebRootMode::Root => "Using root directory with available web files \
                 (no index.html in root, but other web files exist)"
                .to_string(),
            WebRootMode::Subfolder => {
                match self
                    .ranking
                    .iter()
                    .find(|c| c.folder == self.decision.prefix)
                {
                    Some(best) => format!(
                        "Best folder: {} ({} web files, index: {}, score: {})",
                        best.folder, best.web_file_count, best.has_index, best.score
                    ),
                    None => format!("Best folder: {}", self.decision.prefix),
                }
            }
            WebRootMode::None => "No suitable web folder found".to_string(),
        }
    }
}

/// Whether `path` is an html/htm/css/js file
pub fn is_web_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    WEB_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_index_name(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    name == "index.html" || name == "index.htm"
}

fn has_extension(path: &str, ext: &str) -> bool {
    path.to_ascii_lowercase().ends_with(ext)
}

/// Score `folder` against the path list; `None` when it holds no web files
pub fn score_folder(folder: &str, file_paths: &[String]) -> Option<FolderCandidate> {
    let prefix = format!("{}/", folder);
    let folder_files: Vec<&str> = file_paths
        .iter()
        .map(String::as_str)
        .filter(|path| path.starts_with(&prefix))
        .collect();
    let web_files: Vec<&str> = folder_files
        .iter()
        .copied()
        .filter(|path| is_web_file(path))
        .collect();

    if web_files.is_empty() {
        return None;
    }

    let has_index = web_files.iter().any(|path| is_index_name(path));
    let has_css = web_files.iter().any(|path| has_extension(path, ".css"));
    let has_js = web_files.iter().any(|path| has_extension(path, ".js"));
    let max_depth = folder_files
        .iter()
        .map(|path| path[prefix.len()..].split('/').count())
        .max()
        .unwrap_or(0);

    let mut score = web_files.len() as i64;
    if has_index {
        score += INDEX_BONUS;
    }
    if has_css {
        score += CSS_BONUS;
    }
    if has_js {
        score += JS_BONUS;
    }
    if max_depth > DEPTH_ALLOWANCE {
        score -= (max_depth - DEPTH_ALLOWANCE) as i64;
    }

    Some(FolderCandidate {
        folder: folder.to_string(),
        web_file_count: web_files.len(),
        has_index,
        has_css,
        has_js,
        max_depth,
        score,
    })
}

/// Run the heuristic and keep the full ranking
pub fn analyze(file_paths: &[String]) -> WebRootAnalysis {
    let root_web_files: Vec<String> = file_paths
        .iter()
        .filter(|path| !path.contains('/') && is_web_file(path))
        .cloned()
        .collect();
    let has_root_index = root_web_files.iter().any(|path| is_index_name(path));

    let ranking: Vec<FolderCandidate> = CANDIDATE_FOLDERS
        .iter()
        .filter_map(|folder| score_folder(folder, file_paths))
        .collect();

    let decision = if has_root_index {
        WebRootDecision::root(file_paths)
    } else if let Some(best) = best_candidate(&ranking) {
        let prefix = format!("{}/", best.folder);
        WebRootDecision {
            mode: WebRootMode::Subfolder,
            prefix: best.folder.clone(),
            selected_files: file_paths
                .iter()
                .filter(|path| path.starts_with(&prefix))
                .cloned()
                .collect(),
        }
    } else if !root_web_files.is_empty() {
        WebRootDecision::root(file_paths)
    } else {
        WebRootDecision::none()
    };

    WebRootAnalysis {
        root_web_files,
        has_root_index,
        ranking,
        decision,
    }
}

/// Pick the web root for a repository's flat file list
pub fn select_web_root(file_paths: &[String]) -> WebRootDecision {
    analyze(file_paths).decision
}

// The incumbent is only replaced on a strictly greater score
fn best_candidate(ranking: &[FolderCandidate]) -> Option<&FolderCandidate> {
    ranking.iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.score <= current.score => Some(current),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_root_index_deploys_everything() {
        let files = paths(&["index.html", "styles.css", "src/app.js"]);
        let decision = select_web_root(&files);

        assert_eq!(decision.mode, WebRootMode::Root);
        assert_eq!(decision.prefix, "");
        assert_eq!(decision.selected_files, files);
    }

    #[test]
    fn test_root_index_is_case_insensitive() {
        let files = paths(&["INDEX.HTM", "public/index.html", "public/a.css"]);
        assert_eq!(select_web_root(&files).mode, WebRootMode::Root);
    }

    #[test]
    fn test_subfolder_excludes_outside_files() {
        let files = paths(&["src/index.html", "src/app.js", "README.md"]);
        let decision = select_web_root(&files);

        assert_eq!(decision.mode, WebRootMode::Subfolder);
        assert_eq!(decision.prefix, "src");
        assert_eq!(decision.selected_files, paths(&["src/index.html", "src/app.js"]));
    }

    #[test]
    fn test_subfolder_keeps_non_web_assets() {
        let files = paths(&["dist/index.html", "dist/img/logo.png", "notes.txt"]);
        let decision = select_web_root(&files);

        assert_eq!(decision.prefix, "dist");
        assert_eq!(decision.selected_files, paths(&["dist/index.html", "dist/img/logo.png"]));
    }

    #[test]
    fn test_no_web_files() {
        let decision = select_web_root(&paths(&["docs/a.md", "data.csv"]));
        assert_eq!(decision.mode, WebRootMode::None);
        assert!(decision.selected_files.is_empty());
    }

    #[test]
    fn test_root_fallback_without_index() {
        let files = paths(&["main.js", "lib/util.rs"]);
        let decision = select_web_root(&files);

        assert_eq!(decision.mode, WebRootMode::Root);
        assert_eq!(decision.selected_files, files);
    }

    #[test]
    fn test_scored_folder_beats_root_files_without_index() {
        let files = paths(&["main.js", "docs/index.html", "docs/site.css"]);
        let decision = select_web_root(&files);

        assert_eq!(decision.mode, WebRootMode::Subfolder);
        assert_eq!(decision.prefix, "docs");
        assert_eq!(decision.selected_files, paths(&["docs/index.html", "docs/site.css"]));
    }

    #[test]
    fn test_index_outweighs_file_count() {
        let files = paths(&[
            "src/a.js",
            "src/b.js",
            "src/c.js",
            "src/d.js",
            "src/e.js",
            "public/index.html",
        ]);
        // src: 5 + 3 (js) = 8, public: 1 + 10 = 11
        let analysis = analyze(&files);

        assert_eq!(analysis.decision.prefix, "public");
        assert_eq!(analysis.ranking[0].score, 8);
        assert_eq!(analysis.ranking[1].score, 11);
    }

    #[test]
    fn test_tie_keeps_earlier_candidate() {
        let files = paths(&["docs/index.html", "dist/index.html"]);
        let decision = select_web_root(&files);
        // dist precedes docs in the candidate list
        assert_eq!(decision.prefix, "dist");
    }

    #[test]
    fn test_depth_penalty() {
        let shallow = score_folder("site", &paths(&["site/index.html", "site/css/a.css"])).unwrap();
        assert_eq!(shallow.max_depth, 2);
        assert_eq!(shallow.score, 2 + 10 + 3);

        let deep = score_folder(
            "web",
            &paths(&["web/index.html", "web/a/b/c/d/app.js"]),
        )
        .unwrap();
        assert_eq!(deep.max_depth, 5);
        assert_eq!(deep.score, 2 + 10 + 3 - 3);
    }

    #[test]
    fn test_folder_prefix_must_match_whole_segment() {
        assert!(score_folder("app", &paths(&["application/index.html"])).is_none());
    }

    #[test]
    fn test_deterministic_and_idempotent() {
        let files = paths(&[
            "client/index.html",
            "client/main.js",
            "frontend/style.css",
            "frontend/index.htm",
            "README.md",
        ]);
        let first = analyze(&files);
        let second = analyze(&files);
        assert_eq!(first, second);

        let again = select_web_root(&first.decision.selected_files);
        assert_eq!(select_web_root(&files), select_web_root(&files));
        assert_eq!(again.mode, WebRootMode::Subfolder);
    }

    #[test]
    fn test_summary_mentions_best_folder() {
        let analysis = analyze(&paths(&["www/index.html"]));
        assert!(analysis.summary().starts_with("Best folder: www"));
        assert_eq!(analysis.decision.source_label(), "/www/");
    }
}
