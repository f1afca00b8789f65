use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tree_sitter::{Language, Node, Parser, Point, Tree};

use crate::model::{Position, Range};

/// Per-language knowledge about what counts as a function and a call.
pub trait LanguageDriver: Send + Sync {
    fn name(&self) -> &'static str;
    /// File extensions handled by this driver (lowercase, without dot).
    fn extensions(&self) -> &'static [&'static str];
    fn language_for_path(&self, path: &Path) -> Language;

    /// Node kinds that define a named function or method.
    fn function_kinds(&self) -> &'static [&'static str];

    /// The name node of a function definition, if it has one.
    fn function_name<'t>(&self, def: Node<'t>) -> Option<Node<'t>> {
        def.child_by_field_name("name")
    }

    /// Node kinds of call expressions. The callee lives in the `function` field.
    fn call_kinds(&self) -> &'static [&'static str] {
        &["call_expression"]
    }
}

struct RustDriver;
impl LanguageDriver for RustDriver {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn language_for_path(&self, _path: &Path) -> Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn function_kinds(&self) -> &'static [&'static str] {
        &["function_item", "function_signature_item"]
    }
}

struct TypeScriptDriver;
impl LanguageDriver for TypeScriptDriver {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"]
    }

    fn language_for_path(&self, path: &Path) -> Language {
        match path_ext_lower(path).as_str() {
            "tsx" | "jsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
            _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }

    fn function_kinds(&self) -> &'static [&'static str] {
        &[
            "function_declaration",
            "generator_function_declaration",
            "method_definition",
            "variable_declarator",
        ]
    }

    fn function_name<'t>(&self, def: Node<'t>) -> Option<Node<'t>> {
        if def.kind() == "variable_declarator" {
            // only `const f = () => ...` / `const f = function () ...`
            let value = def.child_by_field_name("value")?;
            if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
                return None;
            }
        }
        def.child_by_field_name("name")
    }
}

struct PythonDriver;
impl LanguageDriver for PythonDriver {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn language_for_path(&self, _path: &Path) -> Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn function_kinds(&self) -> &'static [&'static str] {
        &["function_definition"]
    }

    fn call_kinds(&self) -> &'static [&'static str] {
        &["call"]
    }
}

/// C and C++ share the declarator-chain shape, so they share a driver.
struct CFamilyDriver {
    cpp: bool,
}

impl LanguageDriver for CFamilyDriver {
    fn name(&self) -> &'static str {
        if self.cpp {
            "cpp"
        } else {
            "c"
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        if self.cpp {
            &["cpp", "cxx", "cc", "hpp", "hxx", "hh", "mm"]
        } else {
            &["c", "h", "m"]
        }
    }

    fn language_for_path(&self, _path: &Path) -> Language {
        if self.cpp {
            tree_sitter_cpp::LANGUAGE.into()
        } else {
            tree_sitter_c::LANGUAGE.into()
        }
    }

    fn function_kinds(&self) -> &'static [&'static str] {
        &["function_definition"]
    }

    fn function_name<'t>(&self, def: Node<'t>) -> Option<Node<'t>> {
        // function_definition → declarator (function_declarator) → declarator (identifier | qualified_identifier ...)
        let mut cur = def.child_by_field_name("declarator")?;
        loop {
            match cur.kind() {
                "identifier" | "field_identifier" | "destructor_name" | "operator_name" => return Some(cur),
                "qualified_identifier" => cur = cur.child_by_field_name("name")?,
                _ => cur = cur.child_by_field_name("declarator")?,
            }
        }
    }
}

pub struct LanguageConfig {
    drivers: Vec<Box<dyn LanguageDriver>>,
    by_ext: HashMap<String, usize>,
}

impl LanguageConfig {
    pub fn driver_for_path(&self, path: &Path) -> Option<&dyn LanguageDriver> {
        let idx = *self.by_ext.get(&path_ext_lower(path))?;
        self.drivers.get(idx).map(|d| d.as_ref())
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        let drivers: Vec<Box<dyn LanguageDriver>> = vec![
            Box::new(RustDriver),
            Box::new(TypeScriptDriver),
            Box::new(PythonDriver),
            Box::new(CFamilyDriver { cpp: false }),
            Box::new(CFamilyDriver { cpp: true }),
        ];

        let mut cfg = Self {
            drivers,
            by_ext: HashMap::new(),
        };

        for (idx, d) in cfg.drivers.iter().enumerate() {
            for ext in d.extensions() {
                cfg.by_ext.insert(ext.to_string(), idx);
            }
        }

        cfg
    }
}

pub fn language_config() -> &'static LanguageConfig {
    static CFG: OnceLock<LanguageConfig> = OnceLock::new();
    CFG.get_or_init(LanguageConfig::default)
}

fn path_ext_lower(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// A parsed source file.
pub struct ParsedFile {
    pub source: String,
    pub tree: Tree,
    pub driver: &'static dyn LanguageDriver,
}

/// A named function found in a file.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    /// Whole definition.
    pub range: Range,
    /// Just the name.
    pub selection_range: Range,
    start_byte: usize,
    end_byte: usize,
}

impl ParsedFile {
    pub fn parse(path: &Path, source: String) -> Result<Self> {
        let driver = language_config()
            .driver_for_path(path)
            .ok_or_else(|| anyhow!("Unsupported file extension: {}", path.display()))?;
        let language = driver.language_for_path(path);

        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .context("Failed to set tree-sitter language")?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| anyhow!("Failed to parse {}", path.display()))?;

        Ok(Self { source, tree, driver })
    }

    pub fn text(&self, node: Node) -> &str {
        node_text(self.source.as_bytes(), node)
    }

    /// Identifier leaf at (or immediately left of) `position`.
    pub fn identifier_at(&self, position: Position) -> Option<Node<'_>> {
        let root = self.tree.root_node();
        let mut candidates = vec![Point::new(position.line as usize, position.character as usize)];
        if position.character > 0 {
            candidates.push(Point::new(position.line as usize, position.character as usize - 1));
        }
        candidates.into_iter().find_map(|p| {
            let node = root.descendant_for_point_range(p, p)?;
            is_identifier_kind(node.kind()).then_some(node)
        })
    }

    /// Ranges of every identifier leaf whose text is `name`, outside comments and strings.
    pub fn identifier_refs(&self, name: &str) -> Vec<Range> {
        let mut out = Vec::new();
        collect_identifier_refs(self.tree.root_node(), self.source.as_bytes(), name, &mut out);
        out
    }

    /// All named function definitions, in source order.
    pub fn functions(&self) -> Vec<FunctionDef> {
        let mut out = Vec::new();
        self.collect_functions(self.tree.root_node(), &mut out);
        out
    }

    fn collect_functions(&self, node: Node, out: &mut Vec<FunctionDef>) {
        if self.driver.function_kinds().contains(&node.kind()) {
            if let Some(name_node) = self.driver.function_name(node) {
                let name = self.text(name_node).trim();
                if !name.is_empty() {
                    out.push(FunctionDef {
                        name: name.to_string(),
                        range: node_range(node),
                        selection_range: node_range(name_node),
                        start_byte: node.start_byte(),
                        end_byte: node.end_byte(),
                    });
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_functions(child, out);
        }
    }

    /// Ranges of callee identifiers for every call whose target ends in `name`.
    pub fn call_sites(&self, name: &str) -> Vec<(Range, usize)> {
        let mut out = Vec::new();
        collect_call_refs(
            self.tree.root_node(),
            self.source.as_bytes(),
            self.driver.call_kinds(),
            name,
            &mut out,
        );
        out
    }
}

impl FunctionDef {
    /// Whether the byte offset lies inside this definition.
    pub fn encloses(&self, byte: usize) -> bool {
        self.start_byte <= byte && byte < self.end_byte
    }

    pub fn byte_len(&self) -> usize {
        self.end_byte - self.start_byte
    }
}

/// Tightest function in `defs` that encloses `byte`.
pub fn enclosing_function(defs: &[FunctionDef], byte: usize) -> Option<&FunctionDef> {
    defs.iter()
        .filter(|d| d.encloses(byte))
        .min_by_key(|d| d.byte_len())
}

pub fn node_range(node: Node) -> Range {
    let s = node.start_position();
    let e = node.end_position();
    Range::from_coords(s.row as u32, s.column as u32, e.row as u32, e.column as u32)
}

fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    std::str::from_utf8(&source[node.start_byte()..node.end_byte()]).unwrap_or("")
}

fn is_identifier_kind(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "type_identifier"
            | "field_identifier"
            | "property_identifier"
            | "shorthand_property_identifier"
            | "shorthand_property_identifier_pattern"
            | "namespace_identifier"
    )
}

fn is_comment_or_string(kind: &str) -> bool {
    kind.contains("comment")
        || matches!(
            kind,
            "string"
                | "string_literal"
                | "raw_string"
                | "raw_string_literal"
                | "char_literal"
                | "template_string"
                | "string_fragment"
                | "string_content"
                | "system_lib_string"
        )
}

fn collect_identifier_refs(node: Node, source: &[u8], name: &str, out: &mut Vec<Range>) {
    let kind = node.kind();
    if is_comment_or_string(kind) {
        return;
    }

    if node.child_count() == 0 {
        if is_identifier_kind(kind) && node_text(source, node) == name {
            out.push(node_range(node));
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_identifier_refs(child, source, name, out);
    }
}

/// Collects `(callee range, call start byte)` for calls targeting `name`.
fn collect_call_refs(node: Node, source: &[u8], call_kinds: &[&str], name: &str, out: &mut Vec<(Range, usize)>) {
    if is_comment_or_string(node.kind()) {
        return;
    }

    if call_kinds.contains(&node.kind()) {
        if let Some(callee) = node
            .child_by_field_name("function")
            .and_then(trailing_call_identifier)
        {
            if node_text(source, callee) == name {
                out.push((node_range(callee), node.start_byte()));
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_call_refs(child, source, call_kinds, name, out);
    }
}

/// The identifier that names the called function: `b` in `a.b()`, `a::b()`, `b<T>()`.
fn trailing_call_identifier(target: Node) -> Option<Node> {
    if is_identifier_kind(target.kind()) {
        return Some(target);
    }
    for field in ["field", "attribute", "property", "name", "function"] {
        if let Some(child) = target.child_by_field_name(field) {
            return trailing_call_identifier(child);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str, src: &str) -> ParsedFile {
        ParsedFile::parse(Path::new(name), src.to_string()).unwrap()
    }

    #[test]
    fn rust_functions_and_calls() {
        let f = parse(
            "lib.rs",
            "fn foo() {}\n\nfn bar() {\n    foo();\n    self::foo();\n    // foo();\n}\n",
        );
        let names: Vec<String> = f.functions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["foo", "bar"]);

        let calls = f.call_sites("foo");
        let lines: Vec<u32> = calls.iter().map(|(r, _)| r.start.line).collect();
        assert_eq!(lines, vec![3, 4]);
        assert_eq!(calls[1].0.start.character, 10);
    }

    #[test]
    fn cpp_qualified_method_name() {
        let f = parse(
            "a.cpp",
            "int Widget::draw(int x) { return helper(x); }\nint helper(int v) { return v; }\n",
        );
        let defs = f.functions();
        assert_eq!(defs[0].name, "draw");
        assert_eq!(defs[1].name, "helper");
        let calls = f.call_sites("helper");
        assert_eq!(calls.len(), 1);
        let enclosing = enclosing_function(&defs, calls[0].1).unwrap();
        assert_eq!(enclosing.name, "draw");
    }

    #[test]
    fn python_attribute_calls() {
        let f = parse("m.py", "def run():\n    obj.step()\n    step()\n    \"step()\"\n");
        let calls = f.call_sites("step");
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn identifier_refs_skip_comments_and_strings() {
        let f = parse("x.c", "int total;\n/* total */\nvoid f() { total = 1; char *s = \"total\"; }\n");
        let refs = f.identifier_refs("total");
        let lines: Vec<u32> = refs.iter().map(|r| r.start.line).collect();
        assert_eq!(lines, vec![0, 2]);
    }

    #[test]
    fn identifier_at_accepts_cursor_after_word() {
        let f = parse("lib.rs", "fn alpha() {}\n");
        let n = f.identifier_at(Position::new(0, 8)).unwrap();
        assert_eq!(f.text(n), "alpha");
        let n = f.identifier_at(Position::new(0, 3)).unwrap();
        assert_eq!(f.text(n), "alpha");
        assert!(f.identifier_at(Position::new(0, 12)).is_none());
    }

    #[test]
    fn typescript_arrow_functions_are_named() {
        let f = parse("a.ts", "const load = () => fetchAll();\nconst n = 3;\nfunction fetchAll() { return 1; }\n");
        let names: Vec<String> = f.functions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["load", "fetchAll"]);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        assert!(ParsedFile::parse(Path::new("notes.txt"), String::new()).is_err());
        assert!(language_config().driver_for_path(Path::new("A.CPP")).is_some());
    }
}
