// evaluator.rs
//
// The expression evaluator half of the checker: expression and annotation
// typing, target binding, and class/function type construction. Every
// result is written through the per-node cache so later passes and the
// effective-type computation see it.

use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use marten_syntax::{LiteralValue, NodeId, NodeKind, Operator, ParamCategory};

use crate::checker::Checker;
use crate::compatibility::{
    DiagAddendum, can_assign, combine_types, map_subtypes, specialize,
    specialized_tuple_element_types,
};
use crate::declarations::{Declaration, SymbolRef, last_typed_declaration, lookup_class_member};
use crate::errors::CheckError;
use crate::scope::ScopeId;
use crate::type_display::print_type;
use crate::types::{
    ClassFlags, ClassId, ClassType, FunctionFlags, FunctionParam, FunctionType, ModuleType, Type,
};
use crate::well_known;

/// How an expression is being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMethod {
    Get,
    Del,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EvalFlags: u8 {
        const ALLOW_FORWARD_REFERENCES = 1 << 0;
    }
}

impl<'a> Checker<'a> {
    /// Type of an expression node, computed and written through the cache.
    pub fn get_type(&mut self, node: NodeId) -> Type {
        self.get_type_with_method(node, EvalMethod::Get)
    }

    pub fn get_type_with_method(&mut self, node: NodeId, method: EvalMethod) -> Type {
        let ty = self.infer_type(node, method);
        self.write_type(node, ty, "expression type")
    }

    /// Write-through used by validations that compute a node's type
    /// out-of-band (inferred returns, yield wrapping).
    pub fn update_expression_type_for_node(&mut self, node: NodeId, ty: Type) {
        self.write_type(node, ty, "updated expression type");
    }

    fn infer_type(&mut self, node: NodeId, _method: EvalMethod) -> Type {
        let module = self.module;
        match module.tree.kind(node) {
            NodeKind::Name { value } => self.type_of_name(node, value),
            NodeKind::MemberAccess { object, member } => {
                self.type_of_member_access(*object, *member)
            }
            NodeKind::Call { callee, arguments } => self.type_of_call(*callee, arguments),
            NodeKind::Literal(value) => self.type_of_literal(value),
            NodeKind::Tuple { items } => self.type_of_tuple(items),
            NodeKind::List { items } => self.type_of_list(items),
            NodeKind::Subscript { base, arguments } => self.type_of_subscript(*base, arguments),
            NodeKind::UnaryOp { operator, operand } => self.type_of_unary(*operator, *operand),
            NodeKind::BinaryOp {
                left,
                operator,
                right,
            } => self.type_of_binary(*left, *operator, *right),
            NodeKind::Lambda {
                parameters,
                expression,
            } => self.type_of_lambda(node, parameters, *expression),
            NodeKind::FormatString { .. } => {
                well_known::builtin_object(self.import_lookup, "str").unwrap_or(Type::Unknown)
            }
            NodeKind::StringList {
                type_annotation, ..
            } => match type_annotation {
                Some(annotation) => self.get_type_of_annotation(*annotation),
                None => well_known::builtin_object(self.import_lookup, "str")
                    .unwrap_or(Type::Unknown),
            },
            NodeKind::Argument { value, .. } => self.get_type(*value),
            // The walker computes these as part of contract validation.
            NodeKind::Yield { .. } | NodeKind::YieldFrom { .. } => self.cached_type(node),
            NodeKind::ClassDef { .. } | NodeKind::FunctionDef { .. } => self.cached_type(node),
            NodeKind::Error { child } => {
                if let Some(child) = child {
                    self.get_type(*child);
                }
                Type::Unknown
            }
            _ => Type::Unknown,
        }
    }

    // ---- names and symbols ----

    /// Resolve a name through the scope chain, falling back to builtins.
    /// Marks the symbol accessed.
    pub(crate) fn resolve_name_symbol(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> Option<(SymbolRef, Option<ScopeId>)> {
        let module = self.module;
        let scope = module.scope_for_node(node);
        if let Some((found_scope, symbol)) = module.scopes.lookup(scope, name) {
            let symbol = symbol.clone();
            self.accessed.mark(symbol.id);
            return Some((symbol, Some(found_scope)));
        }
        let builtins = self.import_lookup.lookup(well_known::BUILTINS_MODULE)?;
        let symbol = builtins.symbols.get(name)?.clone();
        self.accessed.mark(symbol.id);
        Some((symbol, None))
    }

    /// Resolve an assignment-target name without counting it as an access.
    pub(crate) fn resolve_symbol_for_target(&mut self, target: NodeId) -> Option<SymbolRef> {
        let module = self.module;
        let name = module.tree.name_value(target)?;
        let scope = module.scope_for_node(target);
        module.scopes.lookup(scope, name).map(|(_, s)| s.clone())
    }

    fn type_of_name(&mut self, node: NodeId, name: &str) -> Type {
        match self.resolve_name_symbol(node, name) {
            Some((symbol, _)) => self.effective_type_of_symbol(&symbol),
            None => Type::Unknown,
        }
    }

    /// The type external consumers see for a symbol: the declared type of
    /// the last typed declaration, else the union of the inferred types of
    /// its declarations.
    pub(crate) fn effective_type_of_symbol(&mut self, symbol: &SymbolRef) -> Type {
        if let Some(decl) = last_typed_declaration(symbol) {
            let decl = decl.clone();
            return self
                .declared_type_of_declaration(&decl)
                .unwrap_or(Type::Unknown);
        }
        if symbol.declarations.is_empty() {
            return Type::Unknown;
        }
        let inferred: Vec<Type> = symbol
            .declarations
            .iter()
            .map(|decl| self.cached_type(decl.node))
            .collect();
        combine_types(&inferred)
    }

    pub(crate) fn declared_type_of_declaration(&mut self, decl: &Declaration) -> Option<Type> {
        if let Some(ty) = &decl.declared_type {
            return Some(ty.clone());
        }
        decl.annotation
            .map(|annotation| self.get_type_of_annotation(annotation))
    }

    /// The declared type constraining an assignment target, if any of the
    /// target's declarations carry one.
    pub(crate) fn declared_type_for_expression(&mut self, target: NodeId) -> Option<Type> {
        let module = self.module;
        match module.tree.kind(target) {
            NodeKind::Name { .. } => {
                let symbol = self.resolve_symbol_for_target(target)?;
                let decl = last_typed_declaration(&symbol)?.clone();
                self.declared_type_of_declaration(&decl)
            }
            NodeKind::MemberAccess { object, member } => {
                let object_ty = self.cached_type(*object);
                let name = module.tree.name_value(*member)?;
                let class = match &object_ty {
                    Type::Object(class) | Type::Class(class) => class.clone(),
                    _ => return None,
                };
                let (symbol, _) = lookup_class_member(&class, name)?;
                let symbol = symbol.clone();
                let decl = last_typed_declaration(&symbol)?.clone();
                self.declared_type_of_declaration(&decl)
            }
            NodeKind::TypeAnnotation { annotation, .. } => {
                Some(self.get_type_of_annotation(*annotation))
            }
            _ => None,
        }
    }

    // ---- member access ----

    fn type_of_member_access(&mut self, object: NodeId, member: NodeId) -> Type {
        let object_ty = self.get_type(object);
        let module = self.module;
        let Some(name) = module.tree.name_value(member) else {
            return Type::Unknown;
        };

        let mut results = Vec::new();
        for subtype in object_ty.subtypes() {
            let ty = match subtype {
                Type::Any | Type::Unknown => Type::Unknown,
                Type::Object(class) | Type::Class(class) => {
                    let class = class.clone();
                    match lookup_class_member(&class, name) {
                        Some((symbol, _)) => {
                            let symbol = symbol.clone();
                            self.accessed.mark(symbol.id);
                            self.effective_type_of_symbol(&symbol)
                        }
                        None => Type::Unknown,
                    }
                }
                Type::Module(module_ty) => {
                    let path = module_ty.path.clone();
                    match self
                        .import_lookup
                        .lookup(&path)
                        .and_then(|m| m.symbols.get(name))
                    {
                        Some(symbol) => {
                            let symbol = symbol.clone();
                            self.accessed.mark(symbol.id);
                            last_typed_declaration(&symbol)
                                .and_then(|d| d.declared_type.clone())
                                .unwrap_or(Type::Unknown)
                        }
                        None => Type::Unknown,
                    }
                }
                _ => Type::Unknown,
            };
            results.push(ty);
        }
        let result = combine_types(&results);
        self.write_type(member, result.clone(), "member type");
        result
    }

    /// Member lookup against a class, for checks that need the defining
    /// class alongside the symbol.
    pub(crate) fn lookup_member_with_class(
        &mut self,
        class: &Arc<ClassType>,
        name: &str,
    ) -> Option<(SymbolRef, Arc<ClassType>)> {
        lookup_class_member(class, name).map(|(s, c)| (s.clone(), c.clone()))
    }

    // ---- calls and operators ----

    fn type_of_call(&mut self, callee: NodeId, arguments: &[NodeId]) -> Type {
        let callee_ty = self.get_type(callee);
        for argument in arguments {
            self.get_type(*argument);
        }
        let mut results = Vec::new();
        for subtype in callee_ty.subtypes() {
            let ty = match subtype {
                Type::Class(class) => Type::Object(class.clone()),
                Type::Function(function) => specialize(&function.effective_return(), None),
                Type::Any | Type::Unknown => Type::Unknown,
                Type::Never => Type::Never,
                Type::Object(class) => {
                    let class = class.clone();
                    match self.lookup_member_with_class(&class, "__call__") {
                        Some((symbol, _)) => {
                            let ty = self.effective_type_of_symbol(&symbol);
                            match ty.as_function() {
                                Some(function) => specialize(&function.effective_return(), None),
                                None => Type::Unknown,
                            }
                        }
                        None => Type::Unknown,
                    }
                }
                _ => Type::Unknown,
            };
            results.push(ty);
        }
        combine_types(&results)
    }

    fn type_of_literal(&mut self, value: &LiteralValue) -> Type {
        let builtin = |checker: &Self, name: &str| {
            well_known::builtin_object(checker.import_lookup, name).unwrap_or(Type::Unknown)
        };
        match value {
            LiteralValue::Int(_) => builtin(self, "int"),
            LiteralValue::Float(_) => builtin(self, "float"),
            LiteralValue::Str(_) => builtin(self, "str"),
            LiteralValue::Bytes(_) => builtin(self, "bytes"),
            LiteralValue::Bool(_) => builtin(self, "bool"),
            LiteralValue::None => Type::None,
            LiteralValue::Ellipsis => Type::Any,
        }
    }

    fn type_of_tuple(&mut self, items: &[NodeId]) -> Type {
        let element_types: Vec<Type> = items.iter().map(|item| self.get_type(*item)).collect();
        match well_known::builtin_class(self.import_lookup, "tuple") {
            Some(tuple) => Type::Object(tuple.with_type_args(element_types)),
            None => Type::Unknown,
        }
    }

    fn type_of_list(&mut self, items: &[NodeId]) -> Type {
        let element_types: Vec<Type> = items.iter().map(|item| self.get_type(*item)).collect();
        let element = if element_types.is_empty() {
            Type::Unknown
        } else {
            combine_types(&element_types)
        };
        match well_known::builtin_class(self.import_lookup, "list") {
            Some(list) => Type::Object(list.with_type_args(vec![element])),
            None => Type::Unknown,
        }
    }

    fn type_of_subscript(&mut self, base: NodeId, arguments: &[NodeId]) -> Type {
        let base_ty = self.get_type(base);
        match &base_ty {
            // Indexing a specialized container yields its element type.
            Type::Object(class) if class.is_builtin_named("list") => {
                for argument in arguments {
                    self.get_type(*argument);
                }
                class
                    .type_args
                    .as_ref()
                    .and_then(|args| args.first().cloned())
                    .unwrap_or(Type::Unknown)
            }
            Type::Object(class) if class.is_builtin_named("tuple") => {
                for argument in arguments {
                    self.get_type(*argument);
                }
                match &class.type_args {
                    Some(args) => combine_types(args),
                    None => Type::Unknown,
                }
            }
            Type::Object(class) if class.is_builtin_named("str") => {
                for argument in arguments {
                    self.get_type(*argument);
                }
                base_ty.clone()
            }
            // Subscripting a class value builds a specialization, as in
            // `x = list[int]`.
            Type::Class(class) => {
                let class = class.clone();
                let args: Vec<Type> = arguments
                    .iter()
                    .map(|a| self.get_type_of_annotation(*a))
                    .collect();
                Type::Class(class.with_type_args(args))
            }
            _ => {
                for argument in arguments {
                    self.get_type(*argument);
                }
                Type::Unknown
            }
        }
    }

    fn type_of_unary(&mut self, operator: Operator, operand: NodeId) -> Type {
        let operand_ty = self.get_type(operand);
        match operator {
            Operator::Not => {
                well_known::builtin_object(self.import_lookup, "bool").unwrap_or(Type::Unknown)
            }
            _ => operand_ty,
        }
    }

    fn type_of_binary(&mut self, left: NodeId, operator: Operator, right: NodeId) -> Type {
        let left_ty = self.get_type(left);
        let right_ty = self.get_type(right);
        match operator {
            Operator::Equals
            | Operator::NotEquals
            | Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::Is
            | Operator::IsNot
            | Operator::In
            | Operator::NotIn => {
                well_known::builtin_object(self.import_lookup, "bool").unwrap_or(Type::Unknown)
            }
            Operator::And | Operator::Or => combine_types(&[left_ty, right_ty]),
            _ => {
                if left_ty.is_any_or_unknown() || right_ty.is_any_or_unknown() {
                    return Type::Unknown;
                }
                let name_of = |ty: &Type| ty.as_object().map(|c| c.name.clone());
                match (name_of(&left_ty), name_of(&right_ty)) {
                    (Some(a), Some(b)) if a == b => left_ty,
                    (Some(a), Some(b))
                        if (a == "int" && b == "float") || (a == "float" && b == "int") =>
                    {
                        well_known::builtin_object(self.import_lookup, "float")
                            .unwrap_or(Type::Unknown)
                    }
                    _ => Type::Unknown,
                }
            }
        }
    }

    fn type_of_lambda(
        &mut self,
        node: NodeId,
        parameters: &[NodeId],
        expression: NodeId,
    ) -> Type {
        let params = self.build_parameters(parameters);
        let inferred = self.get_type(expression);
        Type::Function(Arc::new(FunctionType {
            name: "<lambda>".to_string(),
            params,
            declared_return: None,
            inferred_return: Some(inferred),
            flags: FunctionFlags::empty(),
            node: Some(node),
        }))
    }

    // ---- annotations ----

    pub fn get_type_of_annotation(&mut self, node: NodeId) -> Type {
        self.get_type_of_annotation_with_flags(node, EvalFlags::ALLOW_FORWARD_REFERENCES)
    }

    pub fn get_type_of_annotation_with_flags(&mut self, node: NodeId, flags: EvalFlags) -> Type {
        let ty = self.infer_annotation_type(node, flags);
        self.write_type(node, ty, "annotation type")
    }

    fn infer_annotation_type(&mut self, node: NodeId, flags: EvalFlags) -> Type {
        let module = self.module;
        match module.tree.kind(node) {
            NodeKind::Name { value } => {
                let Some((symbol, _)) = self.resolve_name_symbol(node, value) else {
                    return Type::Unknown;
                };
                let effective = self.effective_type_of_symbol(&symbol);
                annotation_meaning(effective)
            }
            NodeKind::Literal(LiteralValue::None) => Type::None,
            NodeKind::Literal(LiteralValue::Ellipsis) => Type::Any,
            NodeKind::StringList {
                type_annotation, ..
            } => match type_annotation {
                Some(annotation)
                    if flags.contains(EvalFlags::ALLOW_FORWARD_REFERENCES) =>
                {
                    self.get_type_of_annotation_with_flags(*annotation, flags)
                }
                _ => Type::Unknown,
            },
            NodeKind::Subscript { base, arguments } => {
                self.annotation_subscript(*base, arguments, flags)
            }
            NodeKind::MemberAccess { object, member } => {
                let ty = self.type_of_member_access(*object, *member);
                annotation_meaning(ty)
            }
            _ => Type::Unknown,
        }
    }

    fn annotation_subscript(
        &mut self,
        base: NodeId,
        arguments: &[NodeId],
        flags: EvalFlags,
    ) -> Type {
        let module = self.module;
        // The special typing forms dispatch on the written name; the
        // remainder resolve like ordinary generic classes.
        if let Some(base_name) = module.tree.name_value(base) {
            match base_name {
                "Optional" => {
                    let inner = arguments
                        .first()
                        .map(|a| self.get_type_of_annotation_with_flags(*a, flags))
                        .unwrap_or(Type::Unknown);
                    return combine_types(&[inner, Type::None]);
                }
                "Union" => {
                    let members: Vec<Type> = arguments
                        .iter()
                        .map(|a| self.get_type_of_annotation_with_flags(*a, flags))
                        .collect();
                    return combine_types(&members);
                }
                "Literal" => {
                    let members: Vec<Type> = arguments
                        .iter()
                        .map(|a| match module.tree.kind(*a) {
                            NodeKind::Literal(value) => self.type_of_literal(value),
                            _ => Type::Unknown,
                        })
                        .collect();
                    return combine_types(&members);
                }
                "Type" => {
                    let inner = arguments
                        .first()
                        .map(|a| self.get_type_of_annotation_with_flags(*a, flags))
                        .unwrap_or(Type::Unknown);
                    return match inner {
                        Type::Object(class) => Type::Class(class),
                        other => other,
                    };
                }
                _ => {}
            }
        }
        let base_ty = self.infer_annotation_type(base, flags);
        match base_ty {
            Type::Object(class) => {
                let args: Vec<Type> = arguments
                    .iter()
                    .map(|a| self.get_type_of_annotation_with_flags(*a, flags))
                    .collect();
                Type::Object(class.with_type_args(args))
            }
            other => other,
        }
    }

    pub fn is_annotation_literal_value(&self, string_node: NodeId) -> bool {
        let module = self.module;
        let Some(parent) = module.tree.parent(string_node) else {
            return false;
        };
        match module.tree.kind(parent) {
            NodeKind::Subscript { base, .. } => module.tree.name_value(*base) == Some("Literal"),
            _ => false,
        }
    }

    /// Inside an enum class, an annotated simple name becomes a member of
    /// the enum itself.
    pub(crate) fn transform_type_for_possible_enum_class(
        &mut self,
        name_node: NodeId,
        ty: Type,
    ) -> Type {
        if let Some(scope) = self.enclosing_class_scope(name_node)
            && let Some(class) = self.class_type_of_scope(scope)
            && class.flags.contains(ClassFlags::ENUM_CLASS)
        {
            return Type::Object(class);
        }
        ty
    }

    /// Resolve a name from the canonical typing module.
    pub fn get_typing_type(&self, name: &str) -> Option<Type> {
        well_known::typing_type(self.import_lookup, name)
    }

    // ---- class and function construction ----

    pub fn get_type_of_class(&mut self, node: NodeId) -> Option<Arc<ClassType>> {
        let module = self.module;
        let NodeKind::ClassDef {
            name,
            arguments,
            suite,
            ..
        } = module.tree.kind(node)
        else {
            return None;
        };
        let class_name = module.tree.name_value(*name)?.to_string();
        let id = *self.class_ids.entry(node).or_insert_with(ClassId::fresh);

        let mut flags = ClassFlags::empty();
        let mut bases = Vec::new();
        for argument in arguments {
            match self.get_type(*argument) {
                Type::Class(base) => {
                    if base.flags.contains(ClassFlags::TYPED_DICT) || base.name == "TypedDict" {
                        flags |= ClassFlags::TYPED_DICT;
                    }
                    if base.flags.contains(ClassFlags::ENUM_CLASS) || base.name == "Enum" {
                        flags |= ClassFlags::ENUM_CLASS;
                    }
                    bases.push(Type::Class(base));
                }
                _ => bases.push(Type::Unknown),
            }
        }

        let mut members = Vec::new();
        if let Some(scope_id) = module.scope_of_node.get(suite) {
            for symbol in module.scopes.get(*scope_id).symbols.iter() {
                members.push((symbol.name.clone(), symbol.clone()));
            }
        }

        let class = Arc::new(ClassType {
            id,
            name: class_name,
            flags,
            bases,
            type_params: Vec::new(),
            type_args: None,
            members,
        });
        self.write_type(node, Type::Class(class.clone()), "class type");
        Some(class)
    }

    pub fn get_type_of_function(&mut self, node: NodeId) -> Option<Arc<FunctionType>> {
        let module = self.module;
        let NodeKind::FunctionDef {
            name,
            parameters,
            return_annotation,
            decorators,
            suite,
        } = module.tree.kind(node)
        else {
            return None;
        };
        let function_name = module.tree.name_value(*name)?.to_string();

        let mut flags = FunctionFlags::empty();
        if module.is_generator_function(node) {
            flags |= FunctionFlags::GENERATOR;
        }
        if self.is_stub_file() {
            flags |= FunctionFlags::STUB;
        }
        for decorator in decorators {
            match decorator_name(module, *decorator) {
                Some("staticmethod") => flags |= FunctionFlags::STATIC_METHOD,
                Some("classmethod") => flags |= FunctionFlags::CLASS_METHOD,
                Some("abstractmethod") => flags |= FunctionFlags::ABSTRACT_METHOD,
                _ => flags |= FunctionFlags::SHAPE_EXEMPT,
            }
        }

        let params = self.build_parameters(parameters);
        let declared_return = return_annotation
            .as_ref()
            .map(|annotation| self.get_type_of_annotation(*annotation));
        let inferred_return = self.cache.get(*suite).cloned();

        let function = Arc::new(FunctionType {
            name: function_name,
            params,
            declared_return,
            inferred_return,
            flags,
            node: Some(node),
        });
        self.write_type(node, Type::Function(function.clone()), "function type");
        Some(function)
    }

    fn build_parameters(&mut self, parameters: &[NodeId]) -> SmallVec<[FunctionParam; 4]> {
        let module = self.module;
        let mut params = SmallVec::new();
        for parameter in parameters {
            let NodeKind::Parameter {
                category,
                name,
                annotation,
                default,
            } = module.tree.kind(*parameter)
            else {
                continue;
            };
            let ty = annotation
                .as_ref()
                .map(|a| self.get_type_of_annotation(*a))
                .unwrap_or(Type::Unknown);
            let param_name = name
                .and_then(|n| module.tree.name_value(n))
                .map(str::to_string);
            if let Some(name_node) = name {
                self.write_type(*name_node, ty.clone(), "parameter type");
            }
            params.push(FunctionParam {
                category: *category,
                name: param_name,
                ty,
                has_default: default.is_some(),
            });
        }
        params
    }

    // ---- target binding ----

    pub fn get_type_of_assignment_target(&mut self, target: NodeId, value: NodeId) {
        let value_ty = self.get_type(value);
        self.assign_type_to_target(target, value_ty, value);
    }

    fn assign_type_to_target(&mut self, target: NodeId, ty: Type, value: NodeId) {
        let module = self.module;
        match module.tree.kind(target) {
            NodeKind::Name { .. } => {
                let narrowed = self.check_declared_assignment(target, &ty, value);
                self.write_type(target, narrowed, "assigned type");
            }
            NodeKind::TypeAnnotation {
                target: inner,
                annotation,
            } => {
                let mut declared = self.get_type_of_annotation(*annotation);
                if matches!(module.tree.kind(*inner), NodeKind::Name { .. }) {
                    declared = self.transform_type_for_possible_enum_class(*inner, declared);
                }
                let mut diag = DiagAddendum::new();
                let narrowed = if can_assign(&declared, &ty, &mut diag) {
                    ty
                } else {
                    let span = module.tree.span(value);
                    self.add_error(
                        CheckError::TypeAssignmentMismatch {
                            found: print_type(&ty),
                            declared: print_type(&declared),
                            addendum: diag.format(),
                            span: span.into(),
                        },
                        span,
                    );
                    declared
                };
                self.write_type(*inner, narrowed, "annotated assignment");
            }
            NodeKind::Tuple { items } => {
                let items = items.clone();
                let element_types = match specialized_tuple_element_types(&ty) {
                    Some(args) if args.len() == items.len() => args,
                    _ => vec![Type::Unknown; items.len()],
                };
                for (item, element) in items.iter().zip(element_types) {
                    self.assign_type_to_target(*item, element, value);
                }
            }
            NodeKind::MemberAccess { object, member } => {
                self.get_type(*object);
                let narrowed = self.check_declared_assignment(target, &ty, value);
                self.write_type(*member, narrowed, "member assignment");
            }
            NodeKind::Error { child } => {
                if let Some(child) = child {
                    self.get_type(*child);
                }
            }
            _ => {
                self.get_type(target);
            }
        }
    }

    /// Validate against the target's declared type, returning the type to
    /// cache (the narrowed source on success, the declared type on error).
    fn check_declared_assignment(&mut self, target: NodeId, ty: &Type, value: NodeId) -> Type {
        let Some(declared) = self.declared_type_for_expression(target) else {
            return ty.clone();
        };
        let mut diag = DiagAddendum::new();
        if can_assign(&declared, ty, &mut diag) {
            ty.clone()
        } else {
            let span = self.module.tree.span(value);
            self.add_error(
                CheckError::TypeAssignmentMismatch {
                    found: print_type(ty),
                    declared: print_type(&declared),
                    addendum: diag.format(),
                    span: span.into(),
                },
                span,
            );
            declared
        }
    }

    pub fn get_type_of_aug_assignment_target(&mut self, target: NodeId, value: NodeId) {
        let target_ty = self.get_type(target);
        let value_ty = self.get_type(value);
        let result = if target_ty.is_any_or_unknown() || value_ty.is_any_or_unknown() {
            Type::Unknown
        } else {
            target_ty
        };
        self.write_type(target, result, "augmented target");
    }

    pub fn get_type_of_for_target(&mut self, target: NodeId, iterable: NodeId) {
        let iterable_ty = self.get_type(iterable);
        let element = self.iterable_element_type(&iterable_ty);
        self.assign_type_to_target(target, element, iterable);
    }

    /// The element type produced by iterating a value.
    pub(crate) fn iterable_element_type(&mut self, ty: &Type) -> Type {
        let iterator_ids: Vec<_> = ["Iterator", "Generator", "Iterable"]
            .iter()
            .filter_map(|n| well_known::typing_class(self.import_lookup, n))
            .collect();
        map_subtypes(ty, |subtype| match subtype {
            Type::Any | Type::Unknown => Type::Unknown,
            Type::Object(class) => {
                if class.is_builtin_named("list") {
                    return class
                        .type_args
                        .as_ref()
                        .and_then(|args| args.first().cloned())
                        .unwrap_or(Type::Unknown);
                }
                if class.is_builtin_named("tuple") {
                    return match &class.type_args {
                        Some(args) => combine_types(args),
                        None => Type::Unknown,
                    };
                }
                if class.is_builtin_named("str") {
                    return subtype.clone();
                }
                // A directly-specialized iterator type carries its element
                // as the first argument; otherwise search the bases for
                // the specialization.
                for iterator in &iterator_ids {
                    if class.id == iterator.id
                        && let Some(args) = &class.type_args
                        && let Some(first) = args.first()
                    {
                        return first.clone();
                    }
                }
                for base in &class.bases {
                    if let Type::Class(base_class) = base {
                        for iterator in &iterator_ids {
                            if base_class.id == iterator.id
                                && let Some(args) = &base_class.type_args
                                && let Some(first) = args.first()
                            {
                                return first.clone();
                            }
                        }
                    }
                }
                Type::Unknown
            }
            _ => Type::Unknown,
        })
    }

    pub fn get_type_of_with_item_target(&mut self, item: NodeId) {
        let module = self.module;
        let NodeKind::WithItem { expression, target } = module.tree.kind(item) else {
            return;
        };
        let context_ty = self.get_type(*expression);
        let mut value = context_ty.clone();
        if let Type::Object(class) = &context_ty {
            let class = class.clone();
            if let Some((symbol, _)) = self.lookup_member_with_class(&class, "__enter__") {
                let enter_ty = self.effective_type_of_symbol(&symbol);
                if let Some(function) = enter_ty.as_function() {
                    value = function.effective_return();
                }
            }
        }
        if let Some(target) = target {
            self.assign_type_to_target(*target, value, *expression);
        }
    }

    pub fn get_type_of_except_target(
        &mut self,
        type_expression: Option<NodeId>,
        name: Option<NodeId>,
    ) {
        let ty = match type_expression {
            Some(expression) => {
                let raw = self.get_type(expression);
                exception_instance_type(&raw)
            }
            None => Type::Unknown,
        };
        if let Some(name) = name {
            self.write_type(name, ty, "except target");
        }
    }

    pub fn get_type_of_import_as_target(&mut self, entry: NodeId) {
        let module = self.module;
        let NodeKind::ImportAs {
            module: dotted,
            alias,
        } = module.tree.kind(entry)
        else {
            return;
        };
        let path = dotted.dotted();
        let ty = if self.import_lookup.lookup(&path).is_some() {
            Type::Module(Arc::new(ModuleType { path }))
        } else {
            Type::Unknown
        };
        let bind_node = alias.unwrap_or(entry);
        self.write_type(bind_node, ty, "import target");
    }

    pub fn get_type_of_import_from_target(&mut self, entry: NodeId) {
        let module = self.module;
        let NodeKind::ImportFromAs { name, alias } = module.tree.kind(entry) else {
            return;
        };
        let Some(parent) = module.tree.parent(entry) else {
            return;
        };
        let NodeKind::ImportFrom {
            module: dotted, ..
        } = module.tree.kind(parent)
        else {
            return;
        };
        let member = module.tree.name_value(*name).unwrap_or("");
        let ty = well_known::module_member_type(self.import_lookup, &dotted.dotted(), member)
            .unwrap_or(Type::Unknown);
        let bind_node = alias.unwrap_or(*name);
        self.write_type(bind_node, ty, "import-from target");
    }
}

/// What a resolved name denotes when written in annotation position: a
/// class denotes its instances; the special typing values pass through.
fn annotation_meaning(effective: Type) -> Type {
    match effective {
        Type::Class(class) => Type::Object(class),
        ty @ (Type::Any | Type::None | Type::Never | Type::TypeVar(_)) => ty,
        Type::Unknown => Type::Unknown,
        _ => Type::Unknown,
    }
}

fn decorator_name(module: &crate::module::BoundModule, decorator: NodeId) -> Option<&str> {
    match module.tree.kind(decorator) {
        NodeKind::Name { value } => Some(value.as_str()),
        NodeKind::MemberAccess { member, .. } => module.tree.name_value(*member),
        NodeKind::Call { callee, .. } => decorator_name(module, *callee),
        _ => None,
    }
}

/// The bound type of an except target: classes become their instances,
/// tuples of classes become unions of instances.
fn exception_instance_type(ty: &Type) -> Type {
    map_subtypes(ty, |subtype| match subtype {
        Type::Class(class) => Type::Object(class.clone()),
        Type::Any | Type::Unknown => Type::Unknown,
        Type::Object(class) if class.is_builtin_named("tuple") => match &class.type_args {
            Some(args) => {
                let instances: Vec<Type> = args
                    .iter()
                    .map(|a| match a {
                        Type::Class(c) => Type::Object(c.clone()),
                        other => other.clone(),
                    })
                    .collect();
                combine_types(&instances)
            }
            None => Type::Unknown,
        },
        _ => Type::Unknown,
    })
}
