//! Cross-language correlation
//!
//! Regex-driven detection of HTTP endpoint declarations and outbound API
//! calls, linked across languages by normalized path matching. Detection
//! is heuristic by design; every synthesised entity and edge carries a
//! confidence rather than being filtered.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use onyx_core::{Entity, EntityKind, Language, RelationType, Relationship, Span};

/// One file's source handed to the correlator after analysis.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: String,
    pub language: Language,
    pub text: String,
}

/// Entities and relationships synthesised by a correlation pass.
#[derive(Debug, Default)]
pub struct CorrelatorOutcome {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone)]
struct RouteSite {
    entity_id: String,
    file_path: String,
    language: Language,
    path: String,
    method: Option<String>,
    line: u32,
}

static PY_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@\w+\.route\(\s*["']([^"']+)["']"#).unwrap());
static PY_ROUTE_METHODS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"methods\s*=\s*\[([^\]]+)\]"#).unwrap());
static PY_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@\w+\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#).unwrap());
static GO_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\.(GET|POST|PUT|DELETE|PATCH)\(\s*"([^"]+)""#).unwrap());
static GO_HANDLE_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"http\.HandleFunc\(\s*"([^"]+)""#).unwrap());
static TS_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:app|router)\.(get|post|put|delete|patch)\(\s*["'`]([^"'`]+)"#).unwrap()
});
static NEST_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@(Get|Post|Put|Delete|Patch)\(\s*(?:["']([^"']*)["'])?\)"#).unwrap());

static PY_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"requests\.(get|post|put|delete|patch)\(\s*f?["']([^"']+)"#).unwrap()
});
static GO_HTTP_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"http\.(Get|Post|Head|PostForm)\(\s*"([^"]+)""#).unwrap());
static TS_FETCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"fetch\(\s*["'`]([^"'`]+)"#).unwrap());
static TS_FETCH_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"method\s*:\s*["'](\w+)["']"#).unwrap());
static TS_AXIOS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"axios\.(get|post|put|delete|patch)\(\s*["'`]([^"'`]+)"#).unwrap()
});

/// Run the correlation pass over a batch: detect endpoints and API calls,
/// link them across languages, and tie tests to the endpoints they reach.
pub fn correlate(sources: &[FileSource], entities: &[Entity]) -> CorrelatorOutcome {
    let mut outcome = CorrelatorOutcome::default();
    let mut endpoints = Vec::new();
    let mut api_calls = Vec::new();

    for source in sources {
        detect_endpoints(source, &mut outcome, &mut endpoints, entities);
        detect_api_calls(source, &mut outcome, &mut api_calls, entities);
    }
    debug!(
        "correlator: {} endpoints, {} api calls",
        endpoints.len(),
        api_calls.len()
    );

    link_cross_language(&endpoints, &api_calls, entities, &mut outcome);
    outcome
}

fn detect_endpoints(
    source: &FileSource,
    outcome: &mut CorrelatorOutcome,
    endpoints: &mut Vec<RouteSite>,
    entities: &[Entity],
) {
    for (line_no, line) in source.text.lines().enumerate() {
        let line_no = line_no as u32 + 1;
        let mut found: Vec<(String, Option<String>, &str)> = Vec::new();

        match source.language {
            Language::Python => {
                if let Some(caps) = PY_ROUTE.captures(line) {
                    let method = PY_ROUTE_METHODS
                        .captures(line)
                        .map(|m| first_method(&m[1]))
                        .unwrap_or_else(|| Some("GET".to_string()));
                    found.push((caps[1].to_string(), method, "flask"));
                }
                if let Some(caps) = PY_VERB.captures(line) {
                    found.push((
                        caps[2].to_string(),
                        Some(caps[1].to_uppercase()),
                        "flask",
                    ));
                }
            }
            Language::Go => {
                if let Some(caps) = GO_VERB.captures(line) {
                    found.push((caps[2].to_string(), Some(caps[1].to_string()), "gin"));
                }
                if let Some(caps) = GO_HANDLE_FUNC.captures(line) {
                    found.push((caps[1].to_string(), None, "net/http"));
                }
            }
            Language::TypeScript | Language::JavaScript => {
                if let Some(caps) = TS_VERB.captures(line) {
                    found.push((
                        caps[2].to_string(),
                        Some(caps[1].to_uppercase()),
                        "express",
                    ));
                }
                if let Some(caps) = NEST_VERB.captures(line) {
                    let path = caps.get(2).map_or("/", |m| m.as_str());
                    found.push((
                        path.to_string(),
                        Some(caps[1].to_uppercase()),
                        "nestjs",
                    ));
                }
            }
        }

        for (path, method, framework) in found {
            let normalized = normalize_path(&path);
            let display_method = method.clone().unwrap_or_else(|| "ANY".to_string());
            let name = format!("{} {}", display_method, normalized);
            let span = Span::new(line_no, line_no);
            let mut entity = Entity::new(
                EntityKind::Endpoint,
                name,
                source.path.clone(),
                source.language,
                span,
            )
            .with_property("path", normalized.clone())
            .with_property("framework", framework)
            .with_property("detection", "regex");
            if let Some(ref m) = method {
                entity.set_property("http_method", m.clone());
            }
            let entity_id = entity.id.clone();

            outcome.relationships.push(Relationship::new(
                RelationType::Contains,
                source.path.clone(),
                entity_id.clone(),
                EntityKind::File,
                EntityKind::Endpoint,
            ));
            outcome.relationships.push(Relationship::new(
                RelationType::ExposesEndpoint,
                source.path.clone(),
                entity_id.clone(),
                EntityKind::File,
                EntityKind::Endpoint,
            ));
            // Route handlers are plain callables; test bodies declaring
            // routes would not be handlers.
            if let Some(handler) = enclosing_callable(entities, &source.path, line_no)
                .filter(|h| matches!(h.kind, EntityKind::Function | EntityKind::Method))
            {
                outcome.relationships.push(
                    Relationship::new(
                        RelationType::HandlesRoute,
                        handler.id.clone(),
                        entity_id.clone(),
                        handler.kind,
                        EntityKind::Endpoint,
                    )
                    .with_property("route_path", normalized.clone()),
                );
            }

            endpoints.push(RouteSite {
                entity_id,
                file_path: source.path.clone(),
                language: source.language,
                path: normalized,
                method,
                line: line_no,
            });
            outcome.entities.push(entity);
        }
    }
}

fn detect_api_calls(
    source: &FileSource,
    outcome: &mut CorrelatorOutcome,
    api_calls: &mut Vec<RouteSite>,
    entities: &[Entity],
) {
    let text = &source.text;
    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no as u32 + 1;
        let mut found: Vec<(String, Option<String>, &str)> = Vec::new();

        match source.language {
            Language::Python => {
                if let Some(caps) = PY_REQUEST.captures(line) {
                    found.push((
                        caps[2].to_string(),
                        Some(caps[1].to_uppercase()),
                        "requests",
                    ));
                }
            }
            Language::Go => {
                if let Some(caps) = GO_HTTP_CALL.captures(line) {
                    let method = match &caps[1] {
                        "Get" => "GET",
                        "Head" => "HEAD",
                        _ => "POST",
                    };
                    found.push((caps[2].to_string(), Some(method.to_string()), "net/http"));
                }
            }
            Language::TypeScript | Language::JavaScript => {
                if let Some(caps) = TS_FETCH.captures(line) {
                    // The options object may sit on the same or following
                    // lines; look a short window ahead for the method.
                    let call_at = text
                        .lines()
                        .take(line_no as usize - 1)
                        .map(|l| l.len() + 1)
                        .sum::<usize>()
                        .min(text.len());
                    let mut window_end = (call_at + 240).min(text.len());
                    while !text.is_char_boundary(window_end) {
                        window_end -= 1;
                    }
                    let window = &text[call_at..window_end];
                    let method = TS_FETCH_METHOD
                        .captures(window)
                        .map(|m| m[1].to_uppercase())
                        .unwrap_or_else(|| "GET".to_string());
                    found.push((caps[1].to_string(), Some(method), "fetch"));
                }
                if let Some(caps) = TS_AXIOS.captures(line) {
                    found.push((
                        caps[2].to_string(),
                        Some(caps[1].to_uppercase()),
                        "axios",
                    ));
                }
            }
        }

        for (url, method, library) in found {
            let normalized = normalize_path(&url);
            let display_method = method.clone().unwrap_or_else(|| "GET".to_string());
            let name = format!("{} {}", display_method, normalized);
            let span = Span::new(line_no, line_no);
            let mut entity = Entity::new(
                EntityKind::ApiCall,
                name,
                source.path.clone(),
                source.language,
                span,
            )
            .with_property("path", normalized.clone())
            .with_property("library", library)
            .with_property("detection", "regex");
            if let Some(ref m) = method {
                entity.set_property("http_method", m.clone());
            }
            let entity_id = entity.id.clone();

            outcome.relationships.push(Relationship::new(
                RelationType::Contains,
                source.path.clone(),
                entity_id.clone(),
                EntityKind::File,
                EntityKind::ApiCall,
            ));
            if let Some(caller) = enclosing_callable(entities, &source.path, line_no) {
                outcome.relationships.push(
                    Relationship::new(
                        RelationType::CallsApi,
                        caller.id.clone(),
                        entity_id.clone(),
                        caller.kind,
                        EntityKind::ApiCall,
                    )
                    .with_property("api_endpoint", normalized.clone())
                    .with_property("http_method", display_method.clone()),
                );
            }

            api_calls.push(RouteSite {
                entity_id,
                file_path: source.path.clone(),
                language: source.language,
                path: normalized,
                method,
                line: line_no,
            });
            outcome.entities.push(entity);
        }
    }
}

/// Cross-language edges: one per (ApiCall, Endpoint) pair with matching
/// normalized paths and differing languages. Method disagreement vetoes a
/// pair when both sides declare one.
fn link_cross_language(
    endpoints: &[RouteSite],
    api_calls: &[RouteSite],
    entities: &[Entity],
    outcome: &mut CorrelatorOutcome,
) {
    for call in api_calls {
        for endpoint in endpoints {
            if call.language == endpoint.language {
                continue;
            }
            let Some(confidence) = path_match(&call.path, &endpoint.path) else {
                continue;
            };
            if let (Some(cm), Some(em)) = (&call.method, &endpoint.method) {
                if !cm.eq_ignore_ascii_case(em) {
                    continue;
                }
            }
            let method = call
                .method
                .clone()
                .or_else(|| endpoint.method.clone())
                .unwrap_or_else(|| "GET".to_string());
            outcome.relationships.push(
                Relationship::new(
                    RelationType::Calls,
                    call.entity_id.clone(),
                    endpoint.entity_id.clone(),
                    EntityKind::ApiCall,
                    EntityKind::Endpoint,
                )
                .with_property("cross_language", "true")
                .with_property("api_method", method)
                .with_property("api_path", endpoint.path.clone())
                .with_property("source_language", call.language.as_str())
                .with_property("target_language", endpoint.language.as_str())
                .with_confidence(confidence),
            );

            // TS/JS tests that issue this call also test the endpoint.
            if matches!(call.language, Language::TypeScript | Language::JavaScript) {
                for test in entities.iter().filter(|e| {
                    e.file_path == call.file_path
                        && matches!(e.kind, EntityKind::TestCase | EntityKind::TestFunction)
                        && e.span.start <= call.line
                        && call.line <= e.span.end
                }) {
                    outcome.relationships.push(
                        Relationship::new(
                            RelationType::TestsApi,
                            test.id.clone(),
                            endpoint.entity_id.clone(),
                            test.kind,
                            EntityKind::Endpoint,
                        )
                        .with_property("api_path", endpoint.path.clone()),
                    );
                }
            }
        }
    }
}

/// Re-derive cross-language links from already-persisted Endpoint and
/// ApiCall entities. Relationship ids are deterministic, so re-emitting
/// existing links upserts cleanly; the live engine runs this after each
/// committed file update.
pub fn relink_entities(entities: &[Entity]) -> Vec<Relationship> {
    let site = |e: &Entity| RouteSite {
        entity_id: e.id.clone(),
        file_path: e.file_path.clone(),
        language: e.language,
        path: e.property("path").unwrap_or("/").to_string(),
        method: e.property("http_method").map(str::to_string),
        line: e.span.start,
    };
    let endpoints: Vec<RouteSite> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Endpoint)
        .map(site)
        .collect();
    let api_calls: Vec<RouteSite> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::ApiCall)
        .map(site)
        .collect();
    let mut outcome = CorrelatorOutcome::default();
    link_cross_language(&endpoints, &api_calls, entities, &mut outcome);
    outcome.relationships
}

/// Innermost callable entity in `file` whose span covers `line`.
fn enclosing_callable<'e>(entities: &'e [Entity], file: &str, line: u32) -> Option<&'e Entity> {
    entities
        .iter()
        .filter(|e| {
            e.file_path == file
                && matches!(
                    e.kind,
                    EntityKind::Function
                        | EntityKind::Method
                        | EntityKind::TestFunction
                        | EntityKind::TestCase
                )
                && e.span.start <= line
                && line <= e.span.end
        })
        .min_by_key(|e| e.span.end - e.span.start)
}

/// Strip scheme, host, and query string: `https://api.example.com/users?x=1`
/// → `/users`.
fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim();
    if let Some(scheme_end) = path.find("://") {
        let after_scheme = &path[scheme_end + 3..];
        path = match after_scheme.find('/') {
            Some(slash) => &after_scheme[slash..],
            None => "/",
        };
    }
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Match quality in [0,1]: exact, suffix, or substring.
fn path_match(call_path: &str, endpoint_path: &str) -> Option<f64> {
    if call_path == endpoint_path {
        Some(1.0)
    } else if call_path.ends_with(endpoint_path) || endpoint_path.ends_with(call_path) {
        Some(0.8)
    } else if call_path.contains(endpoint_path) || endpoint_path.contains(call_path) {
        Some(0.6)
    } else {
        None
    }
}

fn first_method(methods_list: &str) -> Option<String> {
    methods_list
        .split(',')
        .next()
        .map(|m| m.trim().trim_matches(|c| c == '"' || c == '\'').to_uppercase())
}

/// Link tests to the entities they exercise, by the `test_target` the
/// analyzers inferred. Exact name match scores 1.0; a case-insensitive
/// match scores 0.8.
pub fn link_tests(entities: &[Entity]) -> Vec<Relationship> {
    let mut edges = Vec::new();
    let targets: Vec<&Entity> = entities
        .iter()
        .filter(|e| {
            !e.is_test()
                && matches!(
                    e.kind,
                    EntityKind::Function | EntityKind::Method | EntityKind::Class
                )
        })
        .collect();

    for test in entities.iter().filter(|e| {
        matches!(e.kind, EntityKind::TestFunction | EntityKind::TestCase)
            && e.get_test_target().is_some()
    }) {
        let wanted = test.get_test_target().unwrap_or_default();
        let mut matched: Vec<(&Entity, f64)> = targets
            .iter()
            .filter(|t| t.name == wanted)
            .map(|t| (*t, 1.0))
            .collect();
        if matched.is_empty() {
            matched = targets
                .iter()
                .filter(|t| t.name.eq_ignore_ascii_case(wanted))
                .map(|t| (*t, 0.8))
                .collect();
        }
        for (target, confidence) in matched {
            edges.push(
                Relationship::new(
                    RelationType::Tests,
                    test.id.clone(),
                    target.id.clone(),
                    test.kind,
                    target.kind,
                )
                .with_confidence(confidence),
            );
            if matches!(target.kind, EntityKind::Function | EntityKind::Method) {
                edges.push(
                    Relationship::new(
                        RelationType::Covers,
                        test.id.clone(),
                        target.id.clone(),
                        test.kind,
                        target.kind,
                    )
                    .with_property("coverage_type", "direct"),
                );
            }
        }
    }
    edges
}
