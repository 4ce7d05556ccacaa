// testing.rs
//
// A binder stand-in for tests: builds decorated parse trees by hand and a
// synthetic builtins/typing pair, so checker tests run without the real
// parser and binder pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashMap;

use marten_syntax::{
    DottedName, LiteralValue, NodeId, NodeKind, ParamCategory, ParseTree, Span,
};

use crate::declarations::{AliasInfo, Declaration, DeclarationKind, Symbol, SymbolId, SymbolRef};
use crate::diagnostics::DiagnosticSettings;
use crate::flow::{FlowFlags, FlowMap};
use crate::module::{BoundModule, FileInfo, ModuleSymbols};
use crate::scope::{ScopeArena, ScopeId, ScopeKind};
use crate::types::{ClassFlags, ClassId, ClassType, Type, TypeVarType};

/// Process-unique symbol ids so fixture modules and test modules never
/// collide.
pub fn fresh_symbol_id() -> SymbolId {
    static NEXT: AtomicU32 = AtomicU32::new(1);
    SymbolId::new(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Builds one module's parse tree and binder decorations.
pub struct ModuleBuilder {
    tree: ParseTree,
    scopes: ScopeArena,
    module_scope: ScopeId,
    scope_of_node: FxHashMap<NodeId, ScopeId>,
    flow: FlowMap,
    yields: FxHashMap<NodeId, Vec<NodeId>>,
    file_path: String,
    is_stub: bool,
    settings: DiagnosticSettings,
    offset: usize,
}

impl ModuleBuilder {
    pub fn new(file_path: &str) -> Self {
        let mut scopes = ScopeArena::new();
        // The module scope's node is fixed up in `finish`.
        let module_scope = scopes.add(ScopeKind::Module, None, NodeId::new(0));
        Self {
            tree: ParseTree::new(),
            scopes,
            module_scope,
            scope_of_node: FxHashMap::default(),
            flow: FlowMap::default(),
            yields: FxHashMap::default(),
            file_path: file_path.to_string(),
            is_stub: false,
            settings: DiagnosticSettings::default(),
            offset: 0,
        }
    }

    pub fn stub(mut self) -> Self {
        self.is_stub = true;
        self
    }

    pub fn settings(mut self, settings: DiagnosticSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn module_scope(&self) -> ScopeId {
        self.module_scope
    }

    fn next_span(&mut self) -> Span {
        let start = self.offset;
        self.offset += 8;
        Span::new(start, start + 7, 1, start as u32 + 1)
    }

    pub fn node(&mut self, kind: NodeKind) -> NodeId {
        let span = self.next_span();
        self.tree.add(span, kind)
    }

    // ---- expressions ----

    pub fn name(&mut self, value: &str) -> NodeId {
        self.node(NodeKind::Name {
            value: value.to_string(),
        })
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.node(NodeKind::Literal(LiteralValue::Int(value)))
    }

    pub fn str_lit(&mut self, value: &str) -> NodeId {
        self.node(NodeKind::Literal(LiteralValue::Str(value.to_string())))
    }

    pub fn bool_lit(&mut self, value: bool) -> NodeId {
        self.node(NodeKind::Literal(LiteralValue::Bool(value)))
    }

    pub fn none_lit(&mut self) -> NodeId {
        self.node(NodeKind::Literal(LiteralValue::None))
    }

    pub fn ellipsis(&mut self) -> NodeId {
        self.node(NodeKind::Literal(LiteralValue::Ellipsis))
    }

    pub fn tuple(&mut self, items: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Tuple { items })
    }

    pub fn member(&mut self, object: NodeId, member_name: &str) -> NodeId {
        let member = self.name(member_name);
        self.node(NodeKind::MemberAccess { object, member })
    }

    pub fn call(&mut self, callee: NodeId, argument_values: Vec<NodeId>) -> NodeId {
        let arguments = argument_values
            .into_iter()
            .map(|value| self.node(NodeKind::Argument { name: None, value }))
            .collect();
        self.node(NodeKind::Call { callee, arguments })
    }

    pub fn subscript(&mut self, base: NodeId, arguments: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Subscript { base, arguments })
    }

    // ---- statements ----

    pub fn suite(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Suite { statements })
    }

    pub fn pass_stmt(&mut self) -> NodeId {
        self.node(NodeKind::Pass)
    }

    pub fn ret(&mut self, expression: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Return { expression })
    }

    pub fn yield_stmt(&mut self, expression: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Yield { expression })
    }

    pub fn raise(&mut self, expression: Option<NodeId>, cause: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Raise { expression, cause })
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.node(NodeKind::Assignment {
            target,
            value,
            annotation_comment: None,
        })
    }

    pub fn type_annotation(&mut self, target: NodeId, annotation: NodeId) -> NodeId {
        self.node(NodeKind::TypeAnnotation { target, annotation })
    }

    pub fn assert_stmt(&mut self, test: NodeId) -> NodeId {
        self.node(NodeKind::Assert {
            test,
            message: None,
        })
    }

    // ---- imports ----

    /// `import a.b [as alias]`, declared in the given scope.
    pub fn import(&mut self, scope: ScopeId, path: &[&str], alias: Option<&str>) -> NodeId {
        let alias_node = alias.map(|a| self.name(a));
        let entry = self.node(NodeKind::ImportAs {
            module: DottedName::new(path),
            alias: alias_node,
        });
        let stmt = self.node(NodeKind::Import {
            entries: vec![entry],
        });
        let bound_name = alias.unwrap_or_else(|| path.first().copied().unwrap_or(""));
        let decl_node = alias_node.unwrap_or(entry);
        self.declare_with(
            scope,
            bound_name,
            Declaration {
                kind: DeclarationKind::Alias(AliasInfo {
                    module_path: path.iter().map(|p| p.to_string()).collect(),
                    imported_name: None,
                    uses_local_name: alias.is_some(),
                }),
                node: decl_node,
                span: self.tree.span(entry),
                annotation: None,
                declared_type: None,
            },
        );
        stmt
    }

    /// `from m import x [as alias]`, declared in the given scope.
    pub fn import_from(
        &mut self,
        scope: ScopeId,
        path: &[&str],
        member: &str,
        alias: Option<&str>,
    ) -> NodeId {
        let name_node = self.name(member);
        let alias_node = alias.map(|a| self.name(a));
        let entry = self.node(NodeKind::ImportFromAs {
            name: name_node,
            alias: alias_node,
        });
        let stmt = self.node(NodeKind::ImportFrom {
            module: DottedName::new(path),
            entries: vec![entry],
        });
        let bound_name = alias.unwrap_or(member);
        let decl_node = alias_node.unwrap_or(name_node);
        self.declare_with(
            scope,
            bound_name,
            Declaration {
                kind: DeclarationKind::Alias(AliasInfo {
                    module_path: path.iter().map(|p| p.to_string()).collect(),
                    imported_name: Some(member.to_string()),
                    uses_local_name: alias.is_some(),
                }),
                node: decl_node,
                span: self.tree.span(name_node),
                annotation: None,
                declared_type: None,
            },
        );
        stmt
    }

    // ---- scopes and symbols ----

    /// A scope whose owning node is attached later with [`attach_scope`].
    ///
    /// [`attach_scope`]: ModuleBuilder::attach_scope
    pub fn add_scope(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        self.scopes.add(kind, Some(parent), NodeId::new(0))
    }

    pub fn attach_scope(&mut self, scope: ScopeId, node: NodeId) {
        self.scopes.get_mut(scope).node = node;
        self.scope_of_node.insert(node, scope);
    }

    /// Map an extra node (a parameter name) into a scope.
    pub fn map_node_scope(&mut self, node: NodeId, scope: ScopeId) {
        self.scope_of_node.insert(node, scope);
    }

    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: DeclarationKind,
        node: NodeId,
        annotation: Option<NodeId>,
    ) -> SymbolRef {
        let span = self.tree.span(node);
        self.declare_with(
            scope,
            name,
            Declaration {
                kind,
                node,
                span,
                annotation,
                declared_type: None,
            },
        )
    }

    pub fn declare_with(
        &mut self,
        scope: ScopeId,
        name: &str,
        declaration: Declaration,
    ) -> SymbolRef {
        let mut symbol = Symbol::new(fresh_symbol_id(), name);
        symbol.declarations.push(declaration);
        let symbol = Arc::new(symbol);
        self.scopes.get_mut(scope).symbols.insert(symbol.clone());
        symbol
    }

    pub fn declare_symbol(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolRef {
        let symbol = Arc::new(symbol);
        self.scopes.get_mut(scope).symbols.insert(symbol.clone());
        symbol
    }

    // ---- definitions with their binder decorations ----

    /// A function definition: builds the node, its scope, and the symbol
    /// declarations for the function and its parameters.
    ///
    /// `params` entries are `(name, annotation, default)`.
    #[allow(clippy::too_many_arguments)]
    pub fn function(
        &mut self,
        scope: ScopeId,
        name: &str,
        params: &[(&str, Option<NodeId>, Option<NodeId>)],
        return_annotation: Option<NodeId>,
        decorators: Vec<NodeId>,
        body: Vec<NodeId>,
    ) -> NodeId {
        let function_scope = self.add_scope(ScopeKind::Function, scope);
        let mut parameters = Vec::new();
        let mut param_decls = Vec::new();
        for (param_name, annotation, default) in params {
            let name_node = self.name(param_name);
            self.map_node_scope(name_node, function_scope);
            let parameter = self.node(NodeKind::Parameter {
                category: ParamCategory::Simple,
                name: Some(name_node),
                annotation: *annotation,
                default: *default,
            });
            parameters.push(parameter);
            param_decls.push((param_name.to_string(), name_node, *annotation));
        }
        let suite = self.suite(body);
        self.attach_scope(function_scope, suite);
        for (param_name, name_node, annotation) in param_decls {
            self.declare(
                function_scope,
                &param_name,
                DeclarationKind::Parameter,
                name_node,
                annotation,
            );
        }

        let name_node = self.name(name);
        let function = self.node(NodeKind::FunctionDef {
            name: name_node,
            parameters,
            return_annotation,
            decorators,
            suite,
        });
        let kind = if self.scopes.get(scope).kind == ScopeKind::Class {
            DeclarationKind::Method
        } else {
            DeclarationKind::Function
        };
        self.declare(scope, name, kind, function, None);
        function
    }

    /// A class definition with a pre-built class scope; member symbols are
    /// whatever was declared into `class_scope`.
    pub fn class(
        &mut self,
        scope: ScopeId,
        class_scope: ScopeId,
        name: &str,
        bases: Vec<NodeId>,
        body: Vec<NodeId>,
    ) -> NodeId {
        let suite = self.suite(body);
        self.attach_scope(class_scope, suite);
        let name_node = self.name(name);
        let class = self.node(NodeKind::ClassDef {
            name: name_node,
            arguments: bases,
            decorators: Vec::new(),
            suite,
        });
        self.declare(scope, name, DeclarationKind::Class, class, None);
        class
    }

    pub fn class_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.add_scope(ScopeKind::Class, parent)
    }

    /// The suite node of a function or class definition.
    pub fn suite_of(&self, definition: NodeId) -> NodeId {
        match self.tree.kind(definition) {
            NodeKind::FunctionDef { suite, .. } | NodeKind::ClassDef { suite, .. } => *suite,
            other => panic!("not a definition: {other:?}"),
        }
    }

    // ---- flow and generator decorations ----

    pub fn mark_unreachable(&mut self, node: NodeId) {
        self.flow.insert(node, FlowFlags::UNREACHABLE);
    }

    pub fn mark_no_fallthrough(&mut self, node: NodeId) {
        self.flow.insert(node, FlowFlags::NO_FALLTHROUGH);
    }

    pub fn record_yields(&mut self, function: NodeId, yields: Vec<NodeId>) {
        self.yields.insert(function, yields);
    }

    pub fn finish(mut self, body: Vec<NodeId>) -> BoundModule {
        let span = Span::new(0, self.offset.max(1), 1, 1);
        let root = self.tree.add(span, NodeKind::Module { body });
        fix_parents(&mut self.tree, root);
        self.scopes.get_mut(self.module_scope).node = root;
        self.scope_of_node.insert(root, self.module_scope);
        BoundModule {
            tree: self.tree,
            root,
            scopes: self.scopes,
            module_scope: self.module_scope,
            scope_of_node: self.scope_of_node,
            flow: self.flow,
            yields_of_function: self.yields,
            file_info: FileInfo {
                file_path: self.file_path,
                is_stub_file: self.is_stub,
                settings: self.settings,
            },
        }
    }
}

fn fix_parents(tree: &mut ParseTree, node: NodeId) {
    for child in tree.children(node) {
        tree.set_parent(child, node);
        fix_parents(tree, child);
    }
}

// ---- synthetic standard library ----

fn make_class(name: &str, bases: Vec<Type>, flags: ClassFlags) -> Arc<ClassType> {
    Arc::new(ClassType {
        id: ClassId::fresh(),
        name: name.to_string(),
        flags,
        bases,
        type_params: Vec::new(),
        type_args: None,
        members: Vec::new(),
    })
}

fn make_generic(name: &str, bases: Vec<Type>, params: &[&str]) -> Arc<ClassType> {
    Arc::new(ClassType {
        id: ClassId::fresh(),
        name: name.to_string(),
        flags: ClassFlags::BUILTIN,
        bases,
        type_params: params
            .iter()
            .map(|p| {
                Type::TypeVar(Arc::new(TypeVarType {
                    name: p.to_string(),
                    bound: None,
                    constraints: Vec::new(),
                }))
            })
            .collect(),
        type_args: None,
        members: Vec::new(),
    })
}

fn typed_symbol(name: &str, kind: DeclarationKind, ty: Type) -> Symbol {
    let mut symbol = Symbol::new(fresh_symbol_id(), name);
    symbol.declarations.push(Declaration {
        kind,
        node: NodeId::new(0),
        span: Span::default(),
        annotation: None,
        declared_type: Some(ty),
    });
    symbol
}

fn class_symbol(class: &Arc<ClassType>) -> Symbol {
    typed_symbol(&class.name, DeclarationKind::Class, Type::Class(class.clone()))
}

/// The classes tests reach for, alongside the module map that serves them
/// through the import lookup.
pub struct TestStdlib {
    pub modules: FxHashMap<String, ModuleSymbols>,
    pub object: Arc<ClassType>,
    pub int: Arc<ClassType>,
    pub bool_: Arc<ClassType>,
    pub float: Arc<ClassType>,
    pub str_: Arc<ClassType>,
    pub tuple: Arc<ClassType>,
    pub list: Arc<ClassType>,
    pub base_exception: Arc<ClassType>,
    pub exception: Arc<ClassType>,
    pub iterator: Arc<ClassType>,
    pub generator: Arc<ClassType>,
}

pub fn test_stdlib() -> TestStdlib {
    let object = make_class("object", Vec::new(), ClassFlags::BUILTIN);
    let object_base = || vec![Type::Class(object.clone())];

    let type_class = make_class(
        "type",
        object_base(),
        ClassFlags::BUILTIN | ClassFlags::TYPE_CLASS,
    );
    let int = make_class("int", object_base(), ClassFlags::BUILTIN);
    let bool_ = make_class("bool", vec![Type::Class(int.clone())], ClassFlags::BUILTIN);
    let float = make_class("float", object_base(), ClassFlags::BUILTIN);
    let str_ = make_class("str", object_base(), ClassFlags::BUILTIN);
    let bytes = make_class("bytes", object_base(), ClassFlags::BUILTIN);
    let tuple = make_generic("tuple", object_base(), &["T"]);
    let list = make_generic("list", object_base(), &["T"]);
    let base_exception = make_class("BaseException", object_base(), ClassFlags::BUILTIN);
    let exception = make_class(
        "Exception",
        vec![Type::Class(base_exception.clone())],
        ClassFlags::BUILTIN,
    );
    let value_error = make_class(
        "ValueError",
        vec![Type::Class(exception.clone())],
        ClassFlags::BUILTIN,
    );

    let mut builtins = ModuleSymbols::default();
    for class in [
        &object,
        &type_class,
        &int,
        &bool_,
        &float,
        &str_,
        &bytes,
        &tuple,
        &list,
        &base_exception,
        &exception,
        &value_error,
    ] {
        builtins.symbols.insert(Arc::new(class_symbol(class)));
    }

    let iterator = make_generic("Iterator", object_base(), &["T"]);
    let generator = make_generic(
        "Generator",
        vec![Type::Class(iterator.clone())],
        &["Y", "S", "R"],
    );
    let iterable = make_generic("Iterable", object_base(), &["T"]);
    let typed_dict = make_class(
        "TypedDict",
        object_base(),
        ClassFlags::BUILTIN | ClassFlags::TYPED_DICT,
    );

    let mut typing = ModuleSymbols::default();
    for class in [&iterator, &generator, &iterable, &typed_dict] {
        typing.symbols.insert(Arc::new(class_symbol(class)));
    }
    typing.symbols.insert(Arc::new(typed_symbol(
        "Any",
        DeclarationKind::Variable,
        Type::Any,
    )));
    typing.symbols.insert(Arc::new(typed_symbol(
        "NoReturn",
        DeclarationKind::Variable,
        Type::Never,
    )));
    for special in ["Optional", "Union", "Literal", "Type"] {
        typing.symbols.insert(Arc::new(typed_symbol(
            special,
            DeclarationKind::Variable,
            Type::Any,
        )));
    }

    let enum_class = make_class("Enum", object_base(), ClassFlags::ENUM_CLASS);
    let mut enum_module = ModuleSymbols::default();
    enum_module
        .symbols
        .insert(Arc::new(class_symbol(&enum_class)));

    let mut modules = FxHashMap::default();
    modules.insert("builtins".to_string(), builtins);
    modules.insert("typing".to_string(), typing);
    modules.insert("enum".to_string(), enum_module);
    modules.insert("os".to_string(), ModuleSymbols::default());

    TestStdlib {
        modules,
        object,
        int,
        bool_,
        float,
        str_,
        tuple,
        list,
        base_exception,
        exception,
        iterator,
        generator,
    }
}
