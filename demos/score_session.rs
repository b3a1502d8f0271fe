//! Record a short drawing through the live recorder and print its verdict

use inkcheck::capture::{
    CapturePointNormalizer, CaptureSurface, PointerEventKind, RawPointerEvent, StrokeRecorder,
};
use inkcheck::{CanvasSize, CaptchaProcessor, PointerType};

fn event(kind: PointerEventKind, x: f64, y: f64, t: f64, pressure: f64) -> RawPointerEvent {
    RawPointerEvent::new(kind, PointerType::Pen, x, y, t).with_pressure(pressure)
}

fn main() {
    // Canvas element rendered at half size, offset inside the page
    let surface = CaptureSurface::new(40.0, 120.0, 400.0, 300.0);
    let normalizer = match CapturePointNormalizer::new(surface, CanvasSize::default()) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return;
        }
    };

    let mut recorder = StrokeRecorder::new(normalizer, 0.0);
    let strokes: [&[(f64, f64, f64, f64)]; 3] = [
        &[(90.0, 370.0, 180.0, 0.2), (120.0, 300.0, 230.0, 0.55), (160.0, 220.0, 300.0, 0.7), (190.0, 330.0, 380.0, 0.4)],
        &[(180.0, 340.0, 820.0, 0.3), (240.0, 200.0, 950.0, 0.65), (300.0, 360.0, 1100.0, 0.45)],
        &[(110.0, 160.0, 1600.0, 0.25), (125.0, 150.0, 1640.0, 0.5), (130.0, 170.0, 1700.0, 0.4)],
    ];

    for samples in strokes {
        for (i, &(x, y, t, p)) in samples.iter().enumerate() {
            let kind = if i == 0 {
                PointerEventKind::Down
            } else {
                PointerEventKind::Move
            };
            recorder.handle(&event(kind, x, y, t, p));
        }
        if let Some(&(x, y, t, _)) = samples.last() {
            recorder.handle(&event(PointerEventKind::Up, x, y, t + 5.0, 0.0));
        }
    }

    let session = recorder.finish("draw a mountain", 2100.0);
    let report = CaptchaProcessor::new().score(&session);

    match report.to_json() {
        Ok(json) => print!("{json}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
