//! Spiderdraw 命令行程序
//!
//! 加载图表（原生 `.spdr` 或文本格式），重新推导关联关系后输出
//! 每个点的有效性和图表的文本表示。

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use spiderdraw_core::prelude::*;
use spiderdraw_file::{native, text};

/// 默认画布尺寸
const CANVAS_SIZE: (f64, f64) = (800.0, 600.0);

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "spiderdraw", version, about, long_about = None)]
struct Args {
    /// 图表文件（`.spdr` 或文本格式）
    input: Option<PathBuf>,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 把结果另存为 `.spdr` 文件
    #[arg(long)]
    save: Option<PathBuf>,

    /// 没有输入文件时使用内置示例图
    #[arg(long)]
    demo: bool,
}

/// 两只蜘蛛落在圆 A、B 上的示例图
fn demo(config: DiagramConfig) -> Result<Diagram> {
    let mut diagram = Diagram::with_canvas(config, CANVAS_SIZE.0, CANVAS_SIZE.1)?;
    diagram.add_circle(Point2::new(300.0, 300.0), 100.0, Some('A'))?;
    diagram.add_circle(Point2::new(500.0, 300.0), 100.0, Some('B'))?;
    diagram.add_line(Point2::new(200.0, 300.0), Point2::new(400.0, 300.0))?;
    diagram.add_point(200.0, 300.0)?;
    diagram.add_point(400.0, 300.0)?;
    diagram.add_point(700.0, 500.0)?;
    Ok(diagram)
}

fn load(path: &Path, config: DiagramConfig) -> Result<Diagram> {
    if path.extension().is_some_and(|ext| ext == "spdr") {
        return native::load(path).with_context(|| format!("failed to load {}", path.display()));
    }
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(text::load_text(config, Some(CANVAS_SIZE), &source)?)
}

fn report(diagram: &Diagram) -> Result<()> {
    for view in diagram.point_views()? {
        let point = diagram.point(view.id).context("point vanished")?;
        let zone: Vec<String> = point
            .circles()
            .iter()
            .filter_map(|c| diagram.circle(c).map(|c| c.display_name()))
            .collect();
        println!(
            "{} ({}, {}) zone [{}] {}",
            view.id,
            view.position.x,
            view.position.y,
            zone.join(","),
            if view.valid { "valid" } else { "INVALID" }
        );
    }

    match diagram.textual_rep() {
        Ok(rep) => println!("{}", rep),
        Err(e) => warn!("No textual form: {}", e),
    }
    Ok(())
}

fn main() -> Result<()> {
    // 初始化日志
    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(Level::INFO).finish())?;

    info!("Starting Spiderdraw...");

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => spiderdraw_file::load_config(path)?,
        None => DiagramConfig::default(),
    };

    let diagram = match (&args.input, args.demo) {
        (Some(path), _) => load(path, config)?,
        (None, true) => demo(config)?,
        (None, false) => bail!("nothing to do: pass a diagram file or --demo"),
    };
    diagram.check_consistency()?;
    report(&diagram)?;

    if let Some(path) = &args.save {
        native::save(&diagram, path)?;
    }
    Ok(())
}
