// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the point cloud engine

use depthfuse::backends::camera::synthetic::SyntheticDepthDevice;
use depthfuse::backends::camera::{
    CameraIdentity, CameraKind, CameraSet, CaptureOptions, LiveCamera, Resolution,
};
use depthfuse::pointcloud::{
    HeadlessRenderer, ModelTransform, PixelOrder, PointCloud, PointCloudOptions, StreamState,
};
use nalgebra::{Matrix4, Vector3};

fn push(set: &mut CameraSet, id: u32, device: SyntheticDepthDevice) {
    let camera = LiveCamera::without_color(
        CameraIdentity::new(CameraKind::RealSense, id),
        Box::new(device),
        &CaptureOptions::default(),
    )
    .unwrap();
    set.push(Box::new(camera));
}

fn options(pixel_order: PixelOrder) -> PointCloudOptions {
    PointCloudOptions {
        pixel_order,
        ..Default::default()
    }
}

#[test]
fn test_offsets_cover_every_camera() {
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(Resolution::new(640, 480), 1000));
    push(&mut cameras, 1, SyntheticDepthDevice::constant(Resolution::new(320, 240), 1000));
    let mut renderer = HeadlessRenderer::new();

    let cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();

    assert_eq!(cloud.offsets(), &[0, 307_200, 384_000, 384_001]);
    assert_eq!(cloud.total_elements(), 384_000);
    assert_eq!(cloud.camera_range(1), Some(307_200..384_000));
    assert_eq!(renderer.vertices().len(), 384_000);
    assert_eq!(renderer.indices().len(), 384_000);
}

#[test]
fn test_update_sets_depth_and_keeps_coefficients() {
    let resolution = Resolution::new(8, 6);
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(resolution, 1500));
    let mut renderer = HeadlessRenderer::new();
    let mut cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();

    let before: Vec<[f32; 2]> = cloud.points().iter().map(|p| p.coefficients()).collect();
    let report = cloud.update(&mut cameras, &mut renderer).unwrap();
    assert_eq!(report.updated, vec![0]);
    assert!(report.disabled.is_empty());

    let after: Vec<[f32; 2]> = cloud.points().iter().map(|p| p.coefficients()).collect();
    assert_eq!(before, after);
    for point in cloud.points() {
        assert!((point.depth() - 1.5).abs() < 1e-6);
        let [x, y, z] = point.position();
        let [cx, cy] = point.coefficients();
        assert!((x - cx * 1.5).abs() < 1e-5);
        assert!((y - cy * 1.5).abs() < 1e-5);
        assert!((z - 1.5).abs() < 1e-6);
    }

    // The renderer mirror got the new depths
    assert!(renderer.vertices().iter().all(|v| (v.depth - 1.5).abs() < 1e-6));
    assert_eq!(renderer.uploads(), &[(0, 48)]);
}

#[test]
fn test_failing_camera_is_disabled_and_others_continue() {
    let resolution = Resolution::new(4, 4);
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(resolution, 900).failing_after(1));
    push(&mut cameras, 1, SyntheticDepthDevice::constant(resolution, 1200));
    let mut renderer = HeadlessRenderer::new();
    let mut cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();

    let first = cloud.update(&mut cameras, &mut renderer).unwrap();
    assert_eq!(first.updated, vec![0, 1]);

    let second = cloud.update(&mut cameras, &mut renderer).unwrap();
    assert_eq!(second.updated, vec![1]);
    assert_eq!(second.disabled, vec![0]);
    assert!(!cameras.get(0).unwrap().is_enabled());
    assert_eq!(cameras.len(), 2);

    // Disabled cameras are skipped quietly and keep their last points
    let third = cloud.update(&mut cameras, &mut renderer).unwrap();
    assert_eq!(third.updated, vec![1]);
    assert!(third.disabled.is_empty());
    assert!(cloud
        .camera_points(0)
        .unwrap()
        .iter()
        .all(|p| (p.depth() - 0.9).abs() < 1e-6));
}

#[test]
fn test_pixel_orders() {
    // Ramp over a 2x2 frame gives samples [100, 200, 300, 400]
    let resolution = Resolution::new(2, 2);
    let expected = [
        (PixelOrder::Native, [0.1, 0.2, 0.3, 0.4]),
        (PixelOrder::VerticalFlip, [0.3, 0.4, 0.1, 0.2]),
        (PixelOrder::Rotate180, [0.4, 0.3, 0.2, 0.1]),
    ];
    for (order, depths) in expected {
        let mut cameras = CameraSet::new();
        push(&mut cameras, 0, SyntheticDepthDevice::ramp(resolution, 100, 400));
        let mut renderer = HeadlessRenderer::new();
        let mut cloud = PointCloud::new(&cameras, &mut renderer, &options(order)).unwrap();
        cloud.update(&mut cameras, &mut renderer).unwrap();

        let got: Vec<f32> = cloud.points().iter().map(|p| p.depth()).collect();
        for (g, e) in got.iter().zip(depths) {
            assert!((g - e).abs() < 1e-6, "{:?}: {:?}", order, got);
        }
    }
}

#[test]
fn test_zero_depth_is_excluded_from_bounds() {
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(Resolution::new(3, 3), 0));
    push(&mut cameras, 1, SyntheticDepthDevice::constant(Resolution::new(3, 3), 2000));
    let mut renderer = HeadlessRenderer::new();
    let mut cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();
    cloud.update(&mut cameras, &mut renderer).unwrap();

    assert!(cloud.bounds(0).unwrap().is_empty());
    let bounds = cloud.bounds(1).unwrap();
    assert_eq!(bounds.count(), 9);
    let min = bounds.min().unwrap();
    let max = bounds.max().unwrap();
    assert!((min[2] - 2.0).abs() < 1e-6 && (max[2] - 2.0).abs() < 1e-6);
}

#[test]
fn test_paused_stream_skips_frames() {
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(Resolution::new(2, 2), 1000));
    let mut renderer = HeadlessRenderer::new();
    let mut cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();

    cloud.pause_stream();
    assert_eq!(cloud.stream_state(), StreamState::Paused);
    let report = cloud.update(&mut cameras, &mut renderer).unwrap();
    assert!(report.updated.is_empty());
    assert!(renderer.uploads().is_empty());

    cloud.resume_stream();
    assert_eq!(cloud.update(&mut cameras, &mut renderer).unwrap().updated, vec![0]);
}

#[test]
fn test_render_draws_all_points_with_model_matrix() {
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(Resolution::new(4, 3), 1000));
    let mut renderer = HeadlessRenderer::new();
    let mut cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();

    let transform = ModelTransform {
        translation: Vector3::new(0.5, 0.0, -1.0),
        scale: 2.0,
        ..Default::default()
    };
    cloud.set_transform(transform);
    cloud.render(&mut renderer, &Matrix4::identity()).unwrap();

    let (uniforms, count) = renderer.last_draw().unwrap();
    assert_eq!(*count, 12);
    let model: [[f32; 4]; 4] = transform.matrix().into();
    assert_eq!(uniforms.model, model);
    assert_eq!(
        uniforms.cube_half_width_per_meter,
        PointCloudOptions::default().cube_half_width_per_meter
    );
}

#[test]
fn test_frame_of_wrong_size_is_rejected() {
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(Resolution::new(2, 2), 1000));
    let mut renderer = HeadlessRenderer::new();
    let mut cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();

    assert!(cloud.ingest(0, &[1000; 3]).is_err());
    assert!(cloud.ingest(5, &[1000; 4]).is_err());
    assert!(cloud.ingest(0, &[1000; 4]).is_ok());
}

#[test]
fn test_alignment_residual_between_cameras() {
    let resolution = Resolution::new(4, 4);
    let mut cameras = CameraSet::new();
    push(&mut cameras, 0, SyntheticDepthDevice::constant(resolution, 1000));
    push(&mut cameras, 1, SyntheticDepthDevice::constant(resolution, 1000));
    push(&mut cameras, 2, SyntheticDepthDevice::constant(resolution, 0));
    let mut renderer = HeadlessRenderer::new();
    let mut cloud = PointCloud::new(&cameras, &mut renderer, &PointCloudOptions::default()).unwrap();
    cloud.update(&mut cameras, &mut renderer).unwrap();

    let aligned = cloud.alignment_residual(0, 1, &Matrix4::identity()).unwrap();
    assert!(aligned.abs() < 1e-6, "{}", aligned);

    // Every reference point lies on the z = 1 m plane
    let shifted = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.1));
    let residual = cloud.alignment_residual(0, 1, &shifted).unwrap();
    assert!((residual - 0.1).abs() < 1e-4, "{}", residual);

    assert!(cloud.alignment_residual(2, 0, &Matrix4::identity()).is_none());
    assert!(cloud.alignment_residual(0, 2, &Matrix4::identity()).is_none());
}
