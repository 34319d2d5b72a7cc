//! Labelled-property graph schema: node tables, relationship tables, and
//! the adjacency rules that constrain which edges may connect which kinds.

use crate::model::{EntityKind, RelationType};

/// Returns true iff the `(source_kind, rel_type, target_kind)` triple is
/// permitted. This table is the single source of truth for both the model
/// helper `Relationship::is_valid_for_schema` and the store's write path.
pub fn is_valid_for_schema(source: EntityKind, rel: RelationType, target: EntityKind) -> bool {
    use EntityKind::*;
    use RelationType::*;

    let callable = |k: EntityKind| matches!(k, Function | Method);
    let test_like = |k: EntityKind| matches!(k, TestFunction | TestCase);

    match rel {
        Contains => source == File && target != File,
        Calls => {
            // ApiCall → Endpoint is the cross-language form produced by the
            // correlator; everything else is ordinary call resolution.
            (test_like(source) || callable(source) || source == ApiCall)
                && (callable(target) || target == Endpoint)
        }
        Imports => source == File && matches!(target, File | Import),
        Inherits => source == Class && target == Class,
        Embeds => source == Struct && target == Struct,
        Implements => source == Struct && target == Interface,
        Defines => matches!(source, Struct | Interface) && target == Method,
        Uses => callable(source) && matches!(target, Struct | Interface),
        Depends => {
            matches!(source, File | Function | Method | Class)
                && matches!(target, File | Function | Method | Class)
        }
        ReExports => source == File && matches!(target, File | Import),
        Decorates => {
            matches!(source, Function | Class | Method) && matches!(target, Function | Class | Method)
        }
        Constrains => source == Interface && matches!(target, Function | Method | Class),
        DynamicImport => {
            matches!(source, File | Function | Method) && matches!(target, File | Import)
        }
        HasProps => matches!(source, Class | Interface) && target == Variable,
        RendersJsx => {
            matches!(source, Function | Method | Class | Variable)
                && matches!(target, Function | Class | Variable)
        }
        Injects => {
            matches!(source, Class | Function | Method)
                && matches!(target, Class | Interface | Variable)
        }
        ConsumesService => {
            matches!(source, Class | Function | Method) && matches!(target, Class | Interface)
        }
        Tests => test_like(source) && matches!(target, Function | Method | Class),
        Covers => test_like(source) && callable(target),
        Mocks => (test_like(source) || source == Mock) && matches!(target, Function | Method | Class),
        SetupFor | TeardownFor => {
            callable(source) && matches!(target, TestFunction | TestCase | TestSuite)
        }
        Asserts => test_like(source) && target == Assertion,
        Verifies | Spies | Stubs => (test_like(source) || source == Mock) && callable(target),
        Fixtures => {
            matches!(source, TestFunction | TestCase | TestSuite) && target == Fixture
        }
        RunsTest => source == TestSuite && test_like(target),
        GroupsTests => {
            source == TestSuite && matches!(target, TestSuite | TestCase | TestFunction)
        }
        Skips => {
            matches!(source, TestFunction | TestCase | TestSuite) && test_like(target)
        }
        HandlesRoute => callable(source) && matches!(target, Variable | Endpoint),
        CallsApi => {
            (callable(source) || test_like(source))
                && matches!(target, Function | ApiCall | Endpoint)
        }
        ExposesEndpoint => {
            matches!(source, File | Function | Method | Class) && target == Endpoint
        }
        UsesMiddleware => {
            matches!(source, Function | Method | Class)
                && matches!(target, Function | Method | Variable)
        }
        TestsApi => test_like(source) && matches!(target, Function | Method | Endpoint),
    }
}

/// Metadata for one node table, as reported by store introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTable {
    pub name: &'static str,
    pub kind: EntityKind,
    /// Column names beyond the shared header (id, name, file_path).
    pub columns: &'static [&'static str],
}

/// Metadata for one relationship table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelTable {
    pub name: &'static str,
    pub rel_type: RelationType,
    /// Every (source, target) kind pair this table accepts.
    pub pairs: Vec<(EntityKind, EntityKind)>,
}

/// The node tables of the schema, one per entity kind.
pub fn node_tables() -> Vec<NodeTable> {
    EntityKind::all()
        .iter()
        .map(|&kind| NodeTable {
            name: kind.table_name(),
            kind,
            columns: columns_for(kind),
        })
        .collect()
}

fn columns_for(kind: EntityKind) -> &'static [&'static str] {
    use EntityKind::*;
    match kind {
        File => &["path", "language"],
        Function => &["signature", "body", "is_exported", "complexity"],
        Class => &["signature"],
        Method => &["signature", "body", "receiver_type"],
        Struct | Interface => &["type_definition"],
        Import => &["path", "alias"],
        Variable => &["type", "value"],
        TestFunction | TestCase => &[
            "signature",
            "body",
            "test_type",
            "test_target",
            "assertion_count",
            "test_framework",
        ],
        TestSuite => &["signature", "test_type", "test_framework", "test_count"],
        Assertion => &["assertion_type", "expected_value", "actual_value"],
        Mock => &["mock_type", "target_entity"],
        Fixture => &["fixture_type", "data_content"],
        Endpoint => &["path", "http_method", "framework"],
        ApiCall => &["path", "http_method", "library"],
    }
}

/// The relationship tables of the schema, with their permitted kind pairs
/// enumerated from the adjacency rules.
pub fn rel_tables() -> Vec<RelTable> {
    RelationType::all()
        .iter()
        .map(|&rel_type| {
            let mut pairs = Vec::new();
            for &source in EntityKind::all() {
                for &target in EntityKind::all() {
                    if is_valid_for_schema(source, rel_type, target) {
                        pairs.push((source, target));
                    }
                }
            }
            RelTable {
                name: rel_type.table_name(),
                rel_type,
                pairs,
            }
        })
        .collect()
}
