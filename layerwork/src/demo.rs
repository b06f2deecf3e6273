//! A short session against a small document: a few processing batches, one of them failing, then an undo
//! and a redo. Everything interesting ends up in the log.

use std::sync::Arc;

use layerwork_core::{
    applicator::{BatchReport, ProcessingApplicator},
    events::ImageEvent,
    image::Image,
    queue::{Exclusivity, Sequentiality},
    settings::Settings,
    state::{Location, NodeData, NodeID, Raster},
    util::{Opacity, Rect},
    visitor::{FillVisitor, OpacityVisitor, VisitContext, VisitError},
};

const DOCUMENT_DIMENSION: u32 = 256;

struct Document {
    image: Arc<Image>,
    background: NodeID,
    sketch: NodeID,
}

fn build_document(settings: Settings) -> anyhow::Result<Document> {
    let image = Image::with_settings(
        Rect::from_size(DOCUMENT_DIMENSION, DOCUMENT_DIMENSION),
        settings,
    )?;
    let (background, sketch) = image.edit_tree(|tree| -> anyhow::Result<_> {
        let root = tree.root();
        let sketch = tree.add_group(Location::IndexInto(root, 0), "sketch")?;
        for (idx, name) in ["lines", "shading", "highlights"].into_iter().enumerate() {
            tree.add_paint_layer(
                Location::IndexInto(sketch, idx),
                name,
                Raster::transparent(DOCUMENT_DIMENSION, DOCUMENT_DIMENSION),
            )?;
        }
        let background = tree.add_paint_layer(
            Location::IndexInto(root, 1),
            "background",
            Raster::filled(DOCUMENT_DIMENSION, DOCUMENT_DIMENSION, [255; 4]),
        )?;
        Ok((background, sketch))
    })?;
    Ok(Document {
        image,
        background,
        sketch,
    })
}

fn log_report(report: &BatchReport) {
    let succeeded = report.succeeded().count();
    let dropped = report.dropped().count();
    log::info!(
        "\"{}\" {}: {succeeded} visited, {dropped} dropped",
        report.name(),
        report.status().as_ref(),
    );
    for (node, err) in report.failures() {
        log::warn!("\"{}\" failed on {node}: {err}", report.name());
    }
}

pub fn run(settings: Settings) -> anyhow::Result<()> {
    let Document {
        image,
        background,
        sketch,
    } = build_document(settings)?;
    let events = image.subscribe();
    let root = image.tree().root();

    // Flood every layer of the sketch, all at once.
    let mut fill = ProcessingApplicator::new(&image, sketch, true, "fill sketch");
    fill.apply_visitor(
        Arc::new(FillVisitor::new([40, 40, 40, 255])),
        Sequentiality::Concurrent,
        Exclusivity::Normal,
    );
    let fill = fill.end();

    // Fade the background by itself.
    let mut fade = ProcessingApplicator::new(&image, background, false, "fade background");
    fade.apply_visitor(
        Arc::new(OpacityVisitor::new(Opacity::saturating(0.25))),
        Sequentiality::Sequential,
        Exclusivity::Exclusive,
    );
    let fade = fade.end();

    // Refuses to touch groups, so this batch only partially succeeds.
    let layers_only = |_: NodeID, node: &mut NodeData, _: &VisitContext| {
        if node.is_group() {
            return Err(VisitError::Unsupported("group"));
        }
        node.set_visible(true);
        Ok(())
    };
    let mut show = ProcessingApplicator::new(&image, root, true, "show layers");
    show.apply_visitor(
        Arc::new(layers_only),
        Sequentiality::Concurrent,
        Exclusivity::Normal,
    );
    let show = show.end();

    for handle in [fill, fade, show] {
        log_report(&handle.wait());
    }

    if let Some(undo) = image.undo() {
        let report = undo.wait();
        log::info!("\"{}\" {}", report.name, report.status.as_ref());
    }
    if let Some(redo) = image.redo() {
        let report = redo.wait();
        log::info!("\"{}\" {}", report.name, report.status.as_ref());
    }
    image.wait_for_done();

    if let Some(dirty) = image.tree().take_dirty(root) {
        log::info!(
            "dirty region {}x{} at ({}, {})",
            dirty.width,
            dirty.height,
            dirty.x,
            dirty.y
        );
    }
    let (mut finished, mut refreshed) = (0, 0);
    for event in events.try_iter() {
        match event {
            ImageEvent::JobFinished { .. } => finished += 1,
            ImageEvent::Refreshed { nodes, .. } => refreshed += nodes,
            _ => (),
        }
    }
    log::info!("{finished} jobs finished, {refreshed} node projections refreshed");
    Ok(())
}
