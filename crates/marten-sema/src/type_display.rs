// type_display.rs
//
// Deterministic type formatting for diagnostics. Output is stable across
// passes: it depends only on the type's structure, never on ids.

use crate::types::{ClassType, FunctionType, Type};

/// Render a type for an error message.
pub fn print_type(ty: &Type) -> String {
    match ty {
        Type::Unknown => "Unknown".to_string(),
        Type::Any => "Any".to_string(),
        Type::None => "None".to_string(),
        Type::Never => "NoReturn".to_string(),
        Type::Class(class) => format!("Type[{}]", print_class(class)),
        Type::Object(class) => print_class(class),
        Type::Function(function) => print_function(function),
        Type::Union(members) => {
            let parts: Vec<String> = members.iter().map(print_type).collect();
            parts.join(" | ")
        }
        Type::TypeVar(tv) => tv.name.clone(),
        Type::Module(module) => format!("Module(\"{}\")", module.path),
    }
}

fn print_class(class: &ClassType) -> String {
    match &class.type_args {
        Some(args) if !args.is_empty() => {
            let parts: Vec<String> = args.iter().map(print_type).collect();
            format!("{}[{}]", class.name, parts.join(", "))
        }
        _ => class.name.clone(),
    }
}

fn print_function(function: &FunctionType) -> String {
    let params: Vec<String> = function
        .params
        .iter()
        .map(|p| match &p.name {
            Some(name) => format!("{}: {}", name, print_type(&p.ty)),
            None => print_type(&p.ty),
        })
        .collect();
    format!(
        "({}) -> {}",
        params.join(", "),
        print_type(&function.effective_return())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassFlags, ClassId};
    use smallvec::smallvec;
    use std::sync::Arc;

    fn class(name: &str) -> Arc<ClassType> {
        Arc::new(ClassType {
            id: ClassId::fresh(),
            name: name.to_string(),
            flags: ClassFlags::BUILTIN,
            bases: Vec::new(),
            type_params: Vec::new(),
            type_args: None,
            members: Vec::new(),
        })
    }

    #[test]
    fn objects_print_bare_class_names() {
        let int = class("int");
        assert_eq!(print_type(&Type::Object(int.clone())), "int");
        assert_eq!(print_type(&Type::Class(int)), "Type[int]");
    }

    #[test]
    fn unions_and_specializations() {
        let list = class("list");
        let int = class("int");
        let specialized = list.with_type_args(vec![Type::Object(int)]);
        let ty = Type::Union(vec![Type::Object(specialized), Type::None]);
        assert_eq!(print_type(&ty), "list[int] | None");
    }

    #[test]
    fn never_prints_as_noreturn() {
        assert_eq!(print_type(&Type::Never), "NoReturn");
    }

    #[test]
    fn functions_print_signatures() {
        let f = FunctionType {
            name: "f".to_string(),
            params: smallvec![crate::types::FunctionParam {
                category: marten_syntax::ParamCategory::Simple,
                name: Some("x".to_string()),
                ty: Type::Any,
                has_default: false,
            }],
            declared_return: Some(Type::None),
            inferred_return: None,
            flags: crate::types::FunctionFlags::empty(),
            node: None,
        };
        assert_eq!(print_type(&Type::Function(Arc::new(f))), "(x: Any) -> None");
    }
}
