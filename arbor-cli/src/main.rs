//! Arbor command-line driver
//!
//! Usage:
//!   arbor layout <scene.json>                 Lay out a scene and print the render tree
//!   arbor layout <scene.json> --json          Print the render tree as JSON
//!   arbor parse <events.json>                 Build a document from SAX events
//!
//! Set `RUST_LOG=arbor=debug` to see layout passes, relayout scheduling and
//! parser pauses.

mod host;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arbor_common::warning::clear_warnings;
use arbor_dom::{DomTree, NodeId, dump_tree};
use arbor_render::{LayoutQuad, LayoutRect, RepaintRecord, Scene, SceneDocument};
use arbor_xml::{PositionedEvent, XmlDocumentParser};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use host::ReportingHost;

/// Arbor: render-tree layout and XML document building from the command line
#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Print the laid out render tree of a scene
    arbor layout scene.json

    # Same, scrolled and in a smaller viewport
    arbor layout scene.json --scroll 0,120 --viewport 640x480

    # Paginate for print with 1000px pages
    arbor layout scene.json --print 1000

    # Replay a tokenizer event stream through the XML parser
    arbor parse events.json
"#)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out a JSON scene, print its render tree and replay its steps
    Layout {
        /// Scene description
        #[arg(value_name = "SCENE")]
        scene: PathBuf,

        /// Print the render tree as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Scroll offset applied after the first layout
        #[arg(long, value_name = "X,Y", value_parser = parse_scroll)]
        scroll: Option<(f32, f32)>,

        /// Viewport size, overriding the scene's
        #[arg(long, value_name = "WxH", value_parser = parse_viewport)]
        viewport: Option<(f32, f32)>,

        /// Lay out for print with pages of this height
        #[arg(long, value_name = "PAGE_HEIGHT")]
        print: Option<f32>,
    },
    /// Build a document from a JSON array of SAX events and print it
    Parse {
        /// Event stream
        #[arg(value_name = "EVENTS")]
        events: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    clear_warnings();

    let cli = Cli::parse();
    match &cli.command {
        Command::Layout {
            scene,
            json,
            scroll,
            viewport,
            print,
        } => {
            let mut scene = load_scene(scene)?;
            if let Some((width, height)) = *viewport {
                scene.viewport.width = width;
                scene.viewport.height = height;
            }
            if scroll.is_some() {
                scene.scroll = *scroll;
            }
            if print.is_some() {
                scene.print_page_height = *print;
            }
            run_layout(&scene, *json)
        }
        Command::Parse { events } => run_parse(events),
    }
}

// ========== layout ==========

fn load_scene(path: &Path) -> Result<Scene> {
    let text = fs::read_to_string(path).with_context(|| format!("reading scene '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing scene '{}'", path.display()))
}

fn run_layout(scene: &Scene, json: bool) -> Result<()> {
    let mut doc = scene.instantiate().context("building the render tree")?;

    if json {
        let dump = serde_json::to_string_pretty(&doc.tree.dump()).context("serializing the render tree")?;
        println!("{dump}");
        return Ok(());
    }

    let viewport = doc.tree.frame_view().viewport();
    println!(
        "{}",
        format!("=== Render Tree (viewport: {}x{}) ===", viewport.width, viewport.height).bold()
    );
    print!("{}", doc.tree.dump_text(Some(&doc.dom)));
    if doc.tree.printing() {
        println!("{} {}", "pages:".cyan(), doc.tree.page_count());
    }

    println!("\n{}", "=== Absolute Quads ===".bold());
    print_quads(&doc);

    for (index, step) in scene.steps.iter().enumerate() {
        println!("\n{}", format!("=== Step {} ===", index + 1).bold());
        println!("{step:?}");
        let repaints = doc
            .apply(step)
            .with_context(|| format!("applying step {}", index + 1))?;
        print_repaints(&repaints);
    }
    Ok(())
}

fn print_quads(doc: &SceneDocument) {
    let mut any = false;
    for node in doc.dom.descendants(NodeId::ROOT) {
        let Some(id) = doc.dom.attribute(node, "id") else {
            continue;
        };
        let Some(renderer) = doc.tree.renderer_for_node(node) else {
            println!("  #{}: {}", id.yellow(), "no renderer".dimmed());
            continue;
        };
        any = true;
        for quad in doc.tree.absolute_quads(renderer) {
            println!("  #{}: {}", id.yellow(), format_quad(&quad));
        }
    }
    if !any {
        println!("  {}", "(no elements with an id)".dimmed());
    }
}

fn print_repaints(repaints: &[RepaintRecord]) {
    if repaints.is_empty() {
        println!("  {}", "no repaints".dimmed());
        return;
    }
    for record in repaints {
        println!("  {} {:?} {}", "repaint".green(), record.target, format_rect(&record.rect));
    }
}

fn format_rect(rect: &LayoutRect) -> String {
    format!(
        "({},{}) {}x{}",
        rect.min_x(),
        rect.min_y(),
        rect.width(),
        rect.height()
    )
}

fn format_quad(quad: &LayoutQuad) -> String {
    [quad.p1, quad.p2, quad.p3, quad.p4]
        .iter()
        .map(|p| format!("({},{})", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_scroll(value: &str) -> Result<(f32, f32), String> {
    parse_pair(value, ',').ok_or_else(|| format!("expected X,Y, got '{value}'"))
}

fn parse_viewport(value: &str) -> Result<(f32, f32), String> {
    parse_pair(value, 'x')
        .filter(|&(w, h)| w > 0.0 && h > 0.0)
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))
}

fn parse_pair(value: &str, separator: char) -> Option<(f32, f32)> {
    let (a, b) = value.split_once(separator)?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

// ========== parse ==========

fn run_parse(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading events '{}'", path.display()))?;
    let events: Vec<PositionedEvent> =
        serde_json::from_str(&text).with_context(|| format!("parsing events '{}'", path.display()))?;

    let mut document = DomTree::new();
    document.set_url(&format!("file://{}", path.display()));
    let mut parser = XmlDocumentParser::new(document, Box::new(ReportingHost));
    for event in events {
        parser.feed(event);
    }
    parser.finish();

    println!("{}", "=== Document ===".bold());
    for line in dump_tree(parser.document(), NodeId::ROOT, 0) {
        println!("{line}");
    }

    let requests = parser.style_sheet_requests();
    if !requests.is_empty() {
        println!("\n{}", "=== Style Sheets ===".bold());
        for (node, request) in requests {
            println!("  {} {} ({node:?})", request.kind.cyan(), request.href);
        }
    }

    let errors = parser.errors();
    if errors.error_count() > 0 {
        println!("\n{}", format!("=== Parse Errors ({}) ===", errors.error_count()).bold());
        for line in errors.messages().lines() {
            println!("  {}", line.red());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scroll() {
        assert_eq!(parse_scroll("0,120"), Ok((0.0, 120.0)));
        assert_eq!(parse_scroll(" 3 , 4 "), Ok((3.0, 4.0)));
        assert!(parse_scroll("12").is_err());
    }

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("640x480"), Ok((640.0, 480.0)));
        assert!(parse_viewport("0x480").is_err());
        assert!(parse_viewport("640,480").is_err());
    }

    #[test]
    fn test_cli_accepts_layout_flags() {
        let cli = Cli::try_parse_from(["arbor", "layout", "s.json", "--json", "--scroll", "1,2", "--print", "900"])
            .expect("flags parse");
        let Command::Layout { json, scroll, print, viewport, .. } = cli.command else {
            panic!("expected the layout command");
        };
        assert!(json);
        assert_eq!(scroll, Some((1.0, 2.0)));
        assert_eq!(print, Some(900.0));
        assert_eq!(viewport, None);
    }

    #[test]
    fn test_format_rect() {
        assert_eq!(format_rect(&arbor_render::geometry::rect(1.0, 2.0, 30.0, 40.0)), "(1,2) 30x40");
    }
}
