//! Run controller (spec.md §4.5, §5): owns every arena, drives the
//! scanner → tracker pipeline one block at a time, fires leg/interval
//! event hooks, and persists the result. Single-threaded cooperative
//! pipeline per spec §5 — there is no background work to join, only a
//! cancellation flag to poll between blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use skycomb_geometry::GroundSource;
use skycomb_scanner::{scan_comb, scan_yolo, ColorFrame, MonoFrame, YoloDetection};
use skycomb_types::{Block, BlockId, DetectorKind, FeatureId, FlightStep, ObjectId, RunConfig, SpanId};

use crate::arena::{Blocks, Features, Objects, Spans, Steps};
use crate::error::CoreError;
use crate::locate;
use crate::namer::Namer;
use crate::span_optimizer;
use crate::tracker::{self, TrackEvent};

/// Event hooks fired at block/leg/interval boundaries (spec §4.5). All
/// methods default to no-ops; implement the ones a caller cares about
/// (progress reporting, live plotting, breakpoints keyed on
/// `TrackerConfig::focus_object_id`, ...).
#[allow(unused_variables)]
pub trait RunEventHandler {
    fn on_run_start(&mut self) {}
    fn on_interval_start(&mut self, block_id: BlockId) {}
    fn on_leg_start_before(&mut self, block_id: BlockId) {}
    fn on_leg_start_after(&mut self, block_id: BlockId) {}
    fn on_leg_end_before(&mut self, block_id: BlockId) {}
    fn on_leg_end_after(&mut self, block_id: BlockId) {}
    fn on_interval_end(&mut self, block_id: BlockId) {}
    fn on_run_end(&mut self, summary: &RunSummary) {}
}

/// No-op handler used when the caller has no interest in the hooks.
#[derive(Debug, Default)]
pub struct NullEventHandler;
impl RunEventHandler for NullEventHandler {}

/// Tally of what happened over the whole run, returned by
/// [`RunController::finish`] (spec §11, a supplemented feature beyond the
/// persisted tables themselves: a human-readable run report).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunSummary {
    pub num_blocks: u32,
    pub num_objects: u32,
    pub num_significant_objects: u32,
    pub num_spans: u32,
    pub num_claims: u32,
    pub num_seeds: u32,
    pub num_consumed: u32,
    pub num_unreal: u32,
    pub num_killed: u32,
}

pub struct RunController<H: RunEventHandler = NullEventHandler> {
    pub config: RunConfig,
    pub blocks: Blocks,
    pub features: Features,
    pub objects: Objects,
    pub spans: Spans,
    pub steps: Steps,

    next_feature_id: FeatureId,
    next_object_id: ObjectId,
    next_span_id: SpanId,
    namer: Namer,
    cancel: Arc<AtomicBool>,
    prev_has_leg: Option<bool>,
    span_start_block_id: Option<BlockId>,
    /// Open span boundary for the leg-free fallback (spec §4.5): set when
    /// the live significant-object count rises off zero while no block in
    /// the run has reported a leg, closed when it drops back to zero.
    fallback_span_start_block_id: Option<BlockId>,
    prev_significant_count: usize,
    any_leg_seen: bool,
    /// Inclusive `[from_s, to_s]` time window in seconds, measured against
    /// `Block::input_frame_ms`; blocks outside it are dropped before
    /// scanning (spec §5, a supplemented feature for re-running a clipped
    /// slice of a flight without re-encoding the source video).
    window: Option<(f64, f64)>,
    summary: RunSummary,
    handler: H,
    ground: Box<dyn GroundSource>,
}

/// One frame's scanner input: already-thresholded mono frame, the
/// original color frame for heat sampling, and (only used in Yolo mode)
/// the external detector's boxes.
pub struct FrameInput<'a> {
    pub original: &'a ColorFrame,
    pub thresholded: &'a MonoFrame,
    pub yolo_detections: &'a [YoloDetection],
}

impl<H: RunEventHandler> RunController<H> {
    pub fn new(config: RunConfig, ground: Box<dyn GroundSource>, mut handler: H) -> Self {
        handler.on_run_start();
        RunController {
            config,
            blocks: Blocks::new(),
            features: Features::new(),
            objects: Objects::new(),
            spans: Spans::new(),
            steps: Steps::new(),
            next_feature_id: FeatureId(0),
            next_object_id: ObjectId(0),
            next_span_id: SpanId(0),
            namer: Namer::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            prev_has_leg: None,
            span_start_block_id: None,
            fallback_span_start_block_id: None,
            prev_significant_count: 0,
            any_leg_seen: false,
            window: None,
            summary: RunSummary::default(),
            handler,
            ground,
        }
    }

    /// Restrict the run to blocks whose `input_frame_ms` falls within
    /// `[from_s, to_s]` (inclusive, in seconds); blocks outside it are
    /// skipped by [`Self::push_block`] before scanning.
    pub fn with_window(mut self, from_s: f64, to_s: f64) -> Self {
        self.window = Some((from_s, to_s));
        self
    }

    /// Record one flight-telemetry step, looked up by `nearest_step_id`
    /// when resolving ground elevation (spec §4.3's DEM fallback chain).
    pub fn push_step(&mut self, step: FlightStep) {
        self.steps.push(step);
    }

    /// A shareable handle a caller can flip from another thread to ask
    /// the run to stop between blocks (spec §11).
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Advance the run by exactly one block: validate ordering, fire leg
    /// transitions, scan, track, and assign names to freshly-significant
    /// objects. Returns the tracker events emitted for this block.
    pub fn push_block(
        &mut self,
        block: Block,
        input: FrameInput<'_>,
    ) -> Result<Vec<TrackEvent>, CoreError> {
        if self.is_cancelled() {
            return Err(CoreError::SpanOptimization {
                reason: "run cancelled".to_string(),
            });
        }

        if let Some((from_s, to_s)) = self.window {
            let t_s = block.input_frame_ms as f64 / 1000.0;
            if t_s < from_s || t_s > to_s {
                return Ok(Vec::new());
            }
        }

        if let Some(last) = self.blocks.iter().last() {
            if !last.can_precede(&block) {
                return Err(CoreError::Entity(skycomb_types::EntityError::BlockMonotonicityViolation {
                    block_id: block.block_id,
                    prev_block_id: last.block_id,
                }));
            }
        }

        let block_id = block.block_id;
        let has_leg = block.has_leg;
        if has_leg {
            self.any_leg_seen = true;
        }
        match (self.prev_has_leg, has_leg) {
            (Some(false) | None, true) => {
                self.handler.on_leg_start_before(block_id);
                self.span_start_block_id = Some(block_id);
                self.handler.on_leg_start_after(block_id);
            }
            (Some(true), false) => {
                self.handler.on_leg_end_before(block_id);
                if let (Some(start), Some(last)) =
                    (self.span_start_block_id.take(), self.blocks.iter().last())
                {
                    let end = last.block_id;
                    span_optimizer::close_span(
                        &mut self.blocks,
                        &mut self.features,
                        &mut self.objects,
                        &mut self.spans,
                        &self.steps,
                        &self.config.geometry,
                        &self.config.span,
                        self.config.tracker.object_min_duration_ms,
                        self.ground.as_ref(),
                        start,
                        end,
                        &mut self.next_span_id,
                    );
                }
                self.handler.on_leg_end_after(block_id);
            }
            _ => {}
        }
        self.prev_has_leg = Some(has_leg);

        if block_id.0 % self.config.span.compare_interval_frames.max(1) == 0 {
            self.handler.on_interval_start(block_id);
        }

        let (new_features, next_feature_id) = match self.config.detector.kind {
            DetectorKind::Comb | DetectorKind::Threshold => scan_comb(
                input.original,
                input.thresholded,
                block_id,
                &self.config.scanner,
                self.next_feature_id,
            )?,
            DetectorKind::Yolo => scan_yolo(
                input.original,
                input.thresholded,
                block_id,
                &self.config.scanner,
                input.yolo_detections,
                true,
                self.next_feature_id,
            )?,
        };
        self.next_feature_id = next_feature_id;

        self.blocks.push(block);

        let mut new_feature_ids = Vec::with_capacity(new_features.len());
        for feature in new_features {
            new_feature_ids.push(self.features.push(feature));
        }

        let events = tracker::process_block(
            &mut self.objects,
            &mut self.features,
            &self.blocks,
            block_id,
            &new_feature_ids,
            &self.config.tracker,
            self.config.scanner.feature_min_overlap_pct,
            &mut self.next_object_id,
            &mut self.next_feature_id,
        )?;

        locate::locate_block(
            &self.blocks,
            &mut self.features,
            &mut self.objects,
            &self.steps,
            &self.config.geometry,
            self.ground.as_ref(),
            self.config.tracker.object_min_duration_ms,
            &new_feature_ids,
        );

        for event in &events {
            match event {
                TrackEvent::Claimed { .. } => self.summary.num_claims += 1,
                TrackEvent::Consumed { .. } => self.summary.num_consumed += 1,
                TrackEvent::Seeded { .. } => self.summary.num_seeds += 1,
                TrackEvent::UnrealAdded { .. } => self.summary.num_unreal += 1,
                TrackEvent::Killed { .. } => self.summary.num_killed += 1,
            }
        }

        for object in self.objects.iter_mut() {
            if object.significant && object.name.is_none() {
                object.name = Some(self.namer.next_name());
            }
        }

        if !self.any_leg_seen {
            let sig_count = self.objects.iter().filter(|o| o.significant).count();
            match (self.prev_significant_count > 0, sig_count > 0) {
                (false, true) => {
                    self.fallback_span_start_block_id = Some(block_id);
                }
                (true, false) => {
                    if let Some(start) = self.fallback_span_start_block_id.take() {
                        span_optimizer::close_span(
                            &mut self.blocks,
                            &mut self.features,
                            &mut self.objects,
                            &mut self.spans,
                            &self.steps,
                            &self.config.geometry,
                            &self.config.span,
                            self.config.tracker.object_min_duration_ms,
                            self.ground.as_ref(),
                            start,
                            block_id,
                            &mut self.next_span_id,
                        );
                    }
                }
                _ => {}
            }
            self.prev_significant_count = sig_count;
        }

        if block_id.0 % self.config.span.compare_interval_frames.max(1) == 0 {
            self.handler.on_interval_end(block_id);
        }

        self.summary.num_blocks += 1;
        Ok(events)
    }

    /// Finalize the run: fire `RunEnd` and hand back the tally.
    pub fn finish(mut self) -> RunSummary {
        if let Some(true) = self.prev_has_leg {
            if let Some(last) = self.blocks.iter().last() {
                let block_id = last.block_id;
                let end = block_id;
                self.handler.on_leg_end_before(block_id);
                if let Some(start) = self.span_start_block_id.take() {
                    span_optimizer::close_span(
                        &mut self.blocks,
                        &mut self.features,
                        &mut self.objects,
                        &mut self.spans,
                        &self.steps,
                        &self.config.geometry,
                        &self.config.span,
                        self.config.tracker.object_min_duration_ms,
                        self.ground.as_ref(),
                        start,
                        end,
                        &mut self.next_span_id,
                    );
                }
                self.handler.on_leg_end_after(block_id);
            }
        }
        if let Some(start) = self.fallback_span_start_block_id.take() {
            if let Some(last) = self.blocks.iter().last() {
                let end = last.block_id;
                span_optimizer::close_span(
                    &mut self.blocks,
                    &mut self.features,
                    &mut self.objects,
                    &mut self.spans,
                    &self.steps,
                    &self.config.geometry,
                    &self.config.span,
                    self.config.tracker.object_min_duration_ms,
                    self.ground.as_ref(),
                    start,
                    end,
                    &mut self.next_span_id,
                );
            }
        }
        self.summary.num_objects = self.objects.len() as u32;
        self.summary.num_significant_objects =
            self.objects.iter().filter(|o| o.significant).count() as u32;
        self.summary.num_spans = self.spans.len() as u32;
        self.handler.on_run_end(&self.summary);
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycomb_types::PlatformPose;

    fn pose() -> PlatformPose {
        PlatformPose {
            northing_m: 0.0,
            easting_m: 0.0,
            altitude_m: 100.0,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            camera_to_vertical_forward_deg: 0.0,
        }
    }

    fn mono_with_hot_square(w: u32, h: u32, x0: u32, y0: u32, n: u32) -> MonoFrame {
        let mut data = vec![0u8; (w * h) as usize];
        for y in y0..y0 + n {
            for x in x0..x0 + n {
                data[(y * w + x) as usize] = 255;
            }
        }
        MonoFrame::new(w, h, data)
    }

    fn color(w: u32, h: u32) -> ColorFrame {
        ColorFrame::new(w, h, vec![180u8; (w * h * 3) as usize])
    }

    fn ground() -> Box<dyn GroundSource> {
        Box::new(skycomb_geometry::ConstantGround { dem_m: Some(0.0), dsm_m: Some(0.0) })
    }

    fn block(id: u32, ms: i64, lineal: f64, has_leg: bool) -> Block {
        Block {
            block_id: BlockId(id),
            input_frame_id: id as u64,
            input_frame_ms: ms,
            frame_ms_reset: false,
            pose: pose(),
            nearest_step_id: skycomb_types::StepId(0),
            step_interp_weights: (1.0, 0.0),
            sum_lineal_m: lineal,
            input_image_dem_m: Some(0.0),
            has_leg,
        }
    }

    #[test]
    fn a_persistent_blob_becomes_a_named_significant_object() {
        let mut config = RunConfig::default();
        config.tracker.object_min_duration_ms = 50;
        config.tracker.object_min_pixels_per_block = 4;
        config.tracker.object_min_density_pct = 0.2;

        let mut controller = RunController::new(config, ground(), NullEventHandler);
        let thresh = mono_with_hot_square(64, 64, 10, 10, 4);
        let orig = color(64, 64);

        for i in 0..3u32 {
            controller
                .push_block(
                    block(i, i as i64 * 40, i as f64, true),
                    FrameInput { original: &orig, thresholded: &thresh, yolo_detections: &[] },
                )
                .unwrap();
        }

        let summary = controller.finish();
        assert_eq!(summary.num_blocks, 3);
        assert_eq!(summary.num_significant_objects, 1);
    }

    #[test]
    fn out_of_order_block_is_rejected() {
        let controller_config = RunConfig::default();
        let mut controller = RunController::new(controller_config, ground(), NullEventHandler);
        let thresh = mono_with_hot_square(32, 32, 5, 5, 3);
        let orig = color(32, 32);

        controller
            .push_block(
                block(5, 200, 1.0, true),
                FrameInput { original: &orig, thresholded: &thresh, yolo_detections: &[] },
            )
            .unwrap();

        let err = controller.push_block(
            block(4, 300, 2.0, true),
            FrameInput { original: &orig, thresholded: &thresh, yolo_detections: &[] },
        );
        assert!(err.is_err());
    }

    #[test]
    fn cancellation_flag_stops_further_blocks() {
        let config = RunConfig::default();
        let mut controller = RunController::new(config, ground(), NullEventHandler);
        let cancel = controller.cancel_handle();
        cancel.store(true, Ordering::Relaxed);

        let thresh = mono_with_hot_square(16, 16, 2, 2, 3);
        let orig = color(16, 16);
        let err = controller.push_block(
            block(0, 0, 0.0, true),
            FrameInput { original: &orig, thresholded: &thresh, yolo_detections: &[] },
        );
        assert!(err.is_err());
    }
}
