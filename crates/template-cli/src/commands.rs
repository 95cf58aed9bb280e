//! The `compile` and `render` commands.

use crate::cli::{CompileArgs, RenderArgs};
use crate::config::TemplateConfig;
use crate::error::CliError;
use crate::orchestrator::resolve_root;
use crate::workspace::Workspace;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use template_compiler::{compile, Ast, Branch, TemplateNode};
use template_runtime::{Runtime, TemplateBuilder};

fn read(path: &Utf8Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn compile_file(path: &Utf8Path) -> Result<(String, Ast), CliError> {
    let source = read(path)?;
    let ast = compile(&source).map_err(|source| CliError::Compile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((source, ast))
}

/// Compiles one template; prints its AST as JSON or as an indented outline.
pub fn compile_command(args: &CompileArgs) -> Result<String, CliError> {
    let (_, ast) = compile_file(&args.file)?;
    if args.json {
        return serde_json::to_string_pretty(&ast).map_err(|e| CliError::Runtime(e.to_string()));
    }
    let mut out = format!("dialect: {:?}\n", ast.dialect);
    outline(&ast.nodes, 0, &mut out);
    let partials = ast.partial_names();
    if !partials.is_empty() {
        out.push_str(&format!("partials: {}\n", partials.join(", ")));
    }
    let calls = ast.call_names();
    if !calls.is_empty() {
        out.push_str(&format!("calls: {}\n", calls.join(", ")));
    }
    Ok(out)
}

fn outline(nodes: &[TemplateNode], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        let line = match node {
            TemplateNode::Html(html) => format!("html {:?}", html.html),
            TemplateNode::Expression(expr) if expr.unsafe_html => {
                format!("html-expression {}", expr.source)
            }
            TemplateNode::Expression(expr) => format!("expression {}", expr.source),
            TemplateNode::If(block) => format!("if {}", block.condition_source),
            TemplateNode::Each(block) => match &block.item_as {
                Some(item) => format!("each {item} in {}", block.over_source),
                None => format!("each {}", block.over_source),
            },
            TemplateNode::Template(partial) => format!("partial {}", partial.name),
            TemplateNode::Slot(slot) => match &slot.name {
                Some(name) => format!("slot {name}"),
                None => "slot".to_string(),
            },
            TemplateNode::Rerender(block) => format!("{} {}", block.mode.keyword(), block.source),
        };
        out.push_str(&format!("{indent}{line}\n"));

        match node {
            TemplateNode::If(block) => {
                outline(&block.content, depth + 1, out);
                for branch in &block.branches {
                    match branch {
                        Branch::ElseIf(b) => {
                            out.push_str(&format!("{indent}else if {}\n", b.condition_source))
                        }
                        Branch::Else(_) => out.push_str(&format!("{indent}else\n")),
                    }
                    outline(branch.content(), depth + 1, out);
                }
            }
            TemplateNode::Each(block) => {
                outline(&block.content, depth + 1, out);
                if let Some(fallback) = &block.else_content {
                    out.push_str(&format!("{indent}else\n"));
                    outline(fallback, depth + 1, out);
                }
            }
            TemplateNode::Rerender(block) => outline(&block.content, depth + 1, out),
            _ => {}
        }
    }
}

/// Renders one template to markup, defining the partials it reaches from
/// the workspace first.
pub fn render_command(args: &RenderArgs) -> Result<String, CliError> {
    let file = resolve_root(&args.file);
    let root = match &args.workspace {
        Some(root) => resolve_root(root),
        None => file
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| resolve_root(Utf8Path::new("."))),
    };
    let workspace = Workspace::open(&root, &[])?;
    let data = match &args.data {
        Some(path) => Some(read_data(path)?),
        None => None,
    };
    render_file(&file, workspace.config(), &workspace.partials(), data)
}

fn read_data(path: &Utf8Path) -> Result<Value, CliError> {
    let text = read(path)?;
    let value: Value = serde_json::from_str(&text).map_err(|e| CliError::InvalidData {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(CliError::InvalidData {
            path: path.to_path_buf(),
            message: "expected a JSON object".to_string(),
        });
    }
    Ok(value)
}

/// Renders `file` against `data`. Evaluation errors are logged and leave
/// their part empty.
pub fn render_file(
    file: &Utf8Path,
    config: &TemplateConfig,
    partials: &IndexMap<String, Utf8PathBuf>,
    data: Option<Value>,
) -> Result<String, CliError> {
    let name = config
        .template_name(file)
        .ok_or_else(|| CliError::NotATemplate {
            path: file.to_path_buf(),
        })?;
    let runtime = Runtime::new();
    let mut pending = vec![(name.to_string(), file.to_path_buf())];
    let mut main = None;
    while let Some((partial, path)) = pending.pop() {
        if runtime.definition(&partial).is_some() {
            continue;
        }
        let (source, ast) = compile_file(&path)?;
        for referenced in ast.partial_names() {
            if runtime.definition(&referenced).is_some() {
                continue;
            }
            match partials.get(referenced.as_str()) {
                Some(path) => pending.push((referenced.to_string(), path.clone())),
                None => tracing::warn!(partial = %referenced, template = %partial, "unknown partial"),
            }
        }
        let definition = runtime
            .define(TemplateBuilder::new(partial.as_str()).source(source))
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        if main.is_none() {
            main = Some(definition);
        }
    }
    let definition = main.ok_or_else(|| CliError::Runtime(format!("template `{name}` was not defined")))?;

    let template = runtime.create(&definition, data);
    let html = template.render(None);
    for error in template.errors() {
        tracing::warn!(%error, "render error");
    }
    template.destroy();
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn workspace() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_compile_outline() {
        let (_dir, root) = workspace();
        let file = root.join("list.tmpl");
        fs::write(
            &file,
            "<ul>{#each item in items}<li>{uppercase item}</li>{else}{> empty}{/each}</ul>{#if a}x{else}y{/if}",
        )
        .unwrap();
        let out = compile_command(&CompileArgs {
            file,
            json: false,
        })
        .unwrap();
        insta::assert_snapshot!(out, @r###"
        dialect: Single
        html "<ul>"
        each item in items
          html "<li>"
          expression uppercase item
          html "</li>"
        else
          partial empty
        html "</ul>"
        if a
          html "x"
        else
          html "y"
        partials: empty
        calls: uppercase
        "###);
    }

    #[test]
    fn test_compile_json_and_errors() {
        let (_dir, root) = workspace();
        let file = root.join("hello.tmpl");
        fs::write(&file, "Hi {name}").unwrap();
        let out = compile_command(&CompileArgs {
            file: file.clone(),
            json: true,
        })
        .unwrap();
        let ast: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(ast["dialect"], "single");
        assert_eq!(ast["nodes"][1]["type"], "expression");
        assert_eq!(ast["nodes"][1]["source"], "name");

        fs::write(&file, "{#if a}open").unwrap();
        let error = compile_command(&CompileArgs { file, json: true }).unwrap_err();
        assert!(matches!(error, CliError::Compile { .. }));

        let missing = compile_command(&CompileArgs {
            file: root.join("missing.tmpl"),
            json: false,
        })
        .unwrap_err();
        assert!(matches!(missing, CliError::Read { .. }));
    }

    #[test]
    fn test_render_with_partials_and_data() {
        let (_dir, root) = workspace();
        fs::write(
            root.join("page.tmpl"),
            "<h1>{title}</h1>{#each items}{> row label=name}{/each}",
        )
        .unwrap();
        fs::write(root.join("row.tmpl"), "<p>{label}{> badge}</p>").unwrap();
        fs::create_dir_all(root.join("shared")).unwrap();
        fs::write(root.join("shared/pill.tmpl"), "<b>*</b>").unwrap();
        fs::write(
            root.join("template.config.json"),
            r#"{"partials": {"badge": "shared/pill.tmpl"}}"#,
        )
        .unwrap();
        fs::write(
            root.join("page.json"),
            r#"{"title": "Fruit", "items": [{"name": "Apple"}, {"name": "Pear"}]}"#,
        )
        .unwrap();

        let html = render_command(&RenderArgs {
            file: root.join("page.tmpl"),
            data: Some(root.join("page.json")),
            workspace: None,
        })
        .unwrap();
        assert_eq!(
            html,
            "<h1>Fruit</h1><p>Apple<b>*</b></p><p>Pear<b>*</b></p>"
        );
    }

    #[test]
    fn test_render_rejects_bad_data() {
        let (_dir, root) = workspace();
        fs::write(root.join("page.tmpl"), "{title}").unwrap();
        fs::write(root.join("data.json"), "[1, 2]").unwrap();
        let error = render_command(&RenderArgs {
            file: root.join("page.tmpl"),
            data: Some(root.join("data.json")),
            workspace: Some(root.clone()),
        })
        .unwrap_err();
        assert!(matches!(error, CliError::InvalidData { .. }));

        let config = TemplateConfig::default();
        let error = render_file(&root.join("data.json"), &config, &IndexMap::new(), None).unwrap_err();
        assert!(matches!(error, CliError::NotATemplate { .. }));

        let html = render_file(&root.join("page.tmpl"), &config, &IndexMap::new(), Some(json!({"title": "T"})))
            .unwrap();
        assert_eq!(html, "T");
    }
}
