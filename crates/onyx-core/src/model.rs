//! Core data structures for the code knowledge graph

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Source languages the analyzers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Go,
    TypeScript,
    JavaScript,
}

impl Language {
    /// Detect language from file extension. Returns `None` for files
    /// outside the supported set.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyi") => Some(Language::Python),
            Some("go") => Some(Language::Go),
            Some("ts") | Some("tsx") => Some(Language::TypeScript),
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Some(Language::JavaScript),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Go => "go",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminates what kind of source construct an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    // ── Structural ──────────────────────────────────────────
    File,
    Function,
    Class,
    Method,
    Struct,
    Interface,
    Import,
    Variable,

    // ── Testing ─────────────────────────────────────────────
    TestFunction,
    TestCase,
    TestSuite,
    Assertion,
    Mock,
    Fixture,

    // ── Cross-language HTTP ─────────────────────────────────
    Endpoint,
    ApiCall,
}

impl EntityKind {
    /// Node-table name in the store schema.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::File => "File",
            EntityKind::Function => "Function",
            EntityKind::Class => "Class",
            EntityKind::Method => "Method",
            EntityKind::Struct => "Struct",
            EntityKind::Interface => "Interface",
            EntityKind::Import => "Import",
            EntityKind::Variable => "Variable",
            EntityKind::TestFunction => "TestFunction",
            EntityKind::TestCase => "TestCase",
            EntityKind::TestSuite => "TestSuite",
            EntityKind::Assertion => "Assertion",
            EntityKind::Mock => "Mock",
            EntityKind::Fixture => "Fixture",
            EntityKind::Endpoint => "Endpoint",
            EntityKind::ApiCall => "APICall",
        }
    }

    /// All kinds, in schema order.
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::File,
            EntityKind::Function,
            EntityKind::Class,
            EntityKind::Method,
            EntityKind::Struct,
            EntityKind::Interface,
            EntityKind::Import,
            EntityKind::Variable,
            EntityKind::TestFunction,
            EntityKind::TestCase,
            EntityKind::TestSuite,
            EntityKind::Assertion,
            EntityKind::Mock,
            EntityKind::Fixture,
            EntityKind::Endpoint,
            EntityKind::ApiCall,
        ]
    }

    pub fn is_test_kind(&self) -> bool {
        matches!(
            self,
            EntityKind::TestFunction | EntityKind::TestCase | EntityKind::TestSuite
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// 1-based line span, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }
}

/// A single node in the code knowledge graph: one source construct.
///
/// Entities are immutable once emitted; live updates supersede them by
/// deleting everything for a file and re-inserting the fresh parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Stable identity: `<file_path>:<start>-<end>:<name>`.
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    /// Header line for functions/methods/classes; empty otherwise.
    pub signature: String,
    /// Raw source span, when retained.
    pub body: Option<String>,
    /// Repository-relative path of the declaring file.
    pub file_path: String,
    pub language: Language,
    pub span: Span,
    /// Enclosing entity (a method's class, a struct's method, …).
    pub parent_id: Option<String>,
    /// Kind-specific attributes: `receiver_type`, `test_target`, `path`, …
    pub properties: BTreeMap<String, String>,
}

impl Entity {
    /// Derive the stable id for a construct at a given position.
    /// Re-parsing identical source yields identical ids.
    pub fn derive_id(file_path: &str, span: Span, name: &str) -> String {
        format!("{}:{}-{}:{}", file_path, span.start, span.end, name)
    }

    pub fn new(
        kind: EntityKind,
        name: impl Into<String>,
        file_path: impl Into<String>,
        language: Language,
        span: Span,
    ) -> Self {
        let name = name.into();
        let file_path = file_path.into();
        Entity {
            id: Self::derive_id(&file_path, span, &name),
            kind,
            name,
            signature: String::new(),
            body: None,
            file_path,
            language,
            span,
            parent_id: None,
            properties: BTreeMap::new(),
        }
    }

    /// The `File` entity representing a source file itself. Its id is the
    /// bare path so invariant 1 (file_path → File resolution) is a lookup.
    pub fn new_file(file_path: impl Into<String>, language: Language, line_count: u32) -> Self {
        let file_path = file_path.into();
        let name = Path::new(&file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.clone());
        Entity {
            id: file_path.clone(),
            kind: EntityKind::File,
            name,
            signature: String::new(),
            body: None,
            file_path,
            language,
            span: Span::new(1, line_count.max(1)),
            parent_id: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Whether this entity is a test construct.
    pub fn is_test(&self) -> bool {
        self.kind.is_test_kind() || self.property("is_test") == Some("true")
    }

    /// Whether a path looks like a test file across the supported languages.
    pub fn is_test_file(path: &str) -> bool {
        let name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        path.contains("__tests__/")
            || name.starts_with("test_")
            || name.ends_with("_test.go")
            || name.ends_with("_test.py")
            || [".test.", ".spec."].iter().any(|m| name.contains(m))
    }

    /// The target name a test exercises, when the analyzer could infer one.
    pub fn get_test_target(&self) -> Option<&str> {
        self.property("test_target")
    }

    /// Hash of the mutable surface of an entity. The live differ compares
    /// this to decide overwrite vs. no-op for ids present in both sets.
    pub fn property_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.signature.hash(&mut hasher);
        self.body.hash(&mut hasher);
        self.parent_id.hash(&mut hasher);
        for (k, v) in &self.properties {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// What kind of relationship a directed edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationType {
    // ── Structural ──────────────────────────────────────────
    Contains,
    Calls,
    Imports,
    Inherits,
    Embeds,
    Implements,
    Defines,
    Uses,
    Depends,
    ReExports,
    Decorates,
    Constrains,
    DynamicImport,
    HasProps,
    RendersJsx,
    Injects,
    ConsumesService,

    // ── Testing ─────────────────────────────────────────────
    Tests,
    Covers,
    Mocks,
    SetupFor,
    TeardownFor,
    Asserts,
    Verifies,
    Spies,
    Stubs,
    Fixtures,
    RunsTest,
    GroupsTests,
    Skips,

    // ── Cross-language HTTP ─────────────────────────────────
    HandlesRoute,
    CallsApi,
    ExposesEndpoint,
    UsesMiddleware,
    TestsApi,
}

impl RelationType {
    /// Relationship-table name in the store schema.
    pub fn table_name(&self) -> &'static str {
        match self {
            RelationType::Contains => "CONTAINS",
            RelationType::Calls => "CALLS",
            RelationType::Imports => "IMPORTS",
            RelationType::Inherits => "INHERITS",
            RelationType::Embeds => "EMBEDS",
            RelationType::Implements => "IMPLEMENTS",
            RelationType::Defines => "DEFINES",
            RelationType::Uses => "USES",
            RelationType::Depends => "DEPENDS",
            RelationType::ReExports => "RE_EXPORTS",
            RelationType::Decorates => "DECORATES",
            RelationType::Constrains => "CONSTRAINS",
            RelationType::DynamicImport => "DYNAMIC_IMPORT",
            RelationType::HasProps => "HAS_PROPS",
            RelationType::RendersJsx => "RENDERS_JSX",
            RelationType::Injects => "INJECTS",
            RelationType::ConsumesService => "CONSUMES_SERVICE",
            RelationType::Tests => "TESTS",
            RelationType::Covers => "COVERS",
            RelationType::Mocks => "MOCKS",
            RelationType::SetupFor => "SETUP_FOR",
            RelationType::TeardownFor => "TEARDOWN_FOR",
            RelationType::Asserts => "ASSERTS",
            RelationType::Verifies => "VERIFIES",
            RelationType::Spies => "SPIES",
            RelationType::Stubs => "STUBS",
            RelationType::Fixtures => "FIXTURES",
            RelationType::RunsTest => "RUNS_TEST",
            RelationType::GroupsTests => "GROUPS_TESTS",
            RelationType::Skips => "SKIPS",
            RelationType::HandlesRoute => "HANDLES_ROUTE",
            RelationType::CallsApi => "CALLS_API",
            RelationType::ExposesEndpoint => "EXPOSES_ENDPOINT",
            RelationType::UsesMiddleware => "USES_MIDDLEWARE",
            RelationType::TestsApi => "TESTS_API",
        }
    }

    pub fn all() -> &'static [RelationType] {
        use RelationType::*;
        &[
            Contains,
            Calls,
            Imports,
            Inherits,
            Embeds,
            Implements,
            Defines,
            Uses,
            Depends,
            ReExports,
            Decorates,
            Constrains,
            DynamicImport,
            HasProps,
            RendersJsx,
            Injects,
            ConsumesService,
            Tests,
            Covers,
            Mocks,
            SetupFor,
            TeardownFor,
            Asserts,
            Verifies,
            Spies,
            Stubs,
            Fixtures,
            RunsTest,
            GroupsTests,
            Skips,
            HandlesRoute,
            CallsApi,
            ExposesEndpoint,
            UsesMiddleware,
            TestsApi,
        ]
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A directed, typed edge between two entities.
///
/// Source and target kinds travel with the edge so the store can pick the
/// right relationship table and validate the write without a lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    /// `<source_id>::<type>::<target_id>`.
    pub id: String,
    pub rel_type: RelationType,
    pub source_id: String,
    pub target_id: String,
    pub source_kind: EntityKind,
    pub target_kind: EntityKind,
    /// Type-specific attributes: `confidence_score`, `mock_type`, …
    pub properties: BTreeMap<String, String>,
}

impl Relationship {
    pub fn derive_id(source_id: &str, rel_type: RelationType, target_id: &str) -> String {
        format!("{}::{}::{}", source_id, rel_type.table_name(), target_id)
    }

    pub fn new(
        rel_type: RelationType,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        source_kind: EntityKind,
        target_kind: EntityKind,
    ) -> Self {
        let source_id = source_id.into();
        let target_id = target_id.into();
        Relationship {
            id: Self::derive_id(&source_id, rel_type, &target_id),
            rel_type,
            source_id,
            target_id,
            source_kind,
            target_kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_confidence(self, score: f64) -> Self {
        self.with_property("confidence_score", format!("{:.2}", score.clamp(0.0, 1.0)))
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Confidence in [0,1] for heuristically resolved targets; `None` when
    /// the edge was never scored (structural edges).
    pub fn get_confidence_score(&self) -> Option<f64> {
        self.property("confidence_score")?.parse().ok()
    }

    pub fn get_coverage_type(&self) -> Option<&str> {
        self.property("coverage_type")
    }

    pub fn get_mock_type(&self) -> Option<&str> {
        self.property("mock_type")
    }

    pub fn get_assertion_type(&self) -> Option<&str> {
        self.property("assertion_type")
    }

    pub fn is_cross_language(&self) -> bool {
        self.property("cross_language") == Some("true")
    }

    /// Whether the (source_kind, type, target_kind) triple is permitted by
    /// the store schema.
    pub fn is_valid_for_schema(&self) -> bool {
        crate::schema::is_valid_for_schema(self.source_kind, self.rel_type, self.target_kind)
    }
}
