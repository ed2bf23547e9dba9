//! Metering region geometry.

use shutter_capture::MeteringRegion;
use shutter_ipc::{PointF, Rect};

/// Weight of the enlarged region surrounding the primary one.
const BLUR_WEIGHT: u32 = MeteringRegion::MAX_WEIGHT / 10;

/// Regions to meter, strongest first.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterRegions {
    regions: Vec<MeteringRegion>,
}

impl MeterRegions {
    /// Regions for `point`, in normalized coordinates of the visible `crop`
    /// (the active array when not zoomed). No point meters the whole crop.
    pub fn compute(
        point: Option<PointF>,
        crop: Rect,
        region_fraction: f32,
        blur_factor: f32,
    ) -> Self {
        let bounds = crop;
        let Some(point) = point else {
            return Self {
                regions: vec![MeteringRegion::new(bounds, MeteringRegion::MAX_WEIGHT)],
            };
        };

        let width = bounds.width().max(0) as f32;
        let height = bounds.height().max(0) as f32;
        let cx = bounds.left as f32 + point.x.clamp(0.0, 1.0) * width;
        let cy = bounds.top as f32 + point.y.clamp(0.0, 1.0) * height;
        let side = (region_fraction * width.min(height)).max(1.0);

        let square = |side: f32| {
            let half = side / 2.0;
            Rect::new(
                (cx - half).round() as i32,
                (cy - half).round() as i32,
                (cx + half).round() as i32,
                (cy + half).round() as i32,
            )
            .clamp_to(&bounds)
        };

        let regions = vec![
            MeteringRegion::new(square(side), MeteringRegion::MAX_WEIGHT),
            MeteringRegion::new(square(side * blur_factor), BLUR_WEIGHT),
        ]
        .into_iter()
        .filter(|r| r.rect.width() > 0 && r.rect.height() > 0)
        .collect();

        Self { regions }
    }

    /// At most `max` regions, for a routine that accepts that many.
    pub fn take(&self, max: usize) -> Vec<MeteringRegion> {
        self.regions.iter().take(max).copied().collect()
    }

    pub fn all(&self) -> &[MeteringRegion] {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR: Rect = Rect {
        left: 0,
        top: 0,
        right: 4000,
        bottom: 3000,
    };

    #[test]
    fn test_no_point_meters_whole_frame() {
        let regions = MeterRegions::compute(None, SENSOR, 0.05, 1.5);
        assert_eq!(
            regions.all(),
            &[MeteringRegion::new(Rect::new(0, 0, 4000, 3000), 1000)]
        );
    }

    #[test]
    fn test_point_regions_centered() {
        let regions = MeterRegions::compute(Some(PointF::center()), SENSOR, 0.05, 2.0);
        let all = regions.all();
        assert_eq!(all.len(), 2);
        // 5% of 3000 is a 150px square.
        assert_eq!(all[0].rect, Rect::new(1925, 1425, 2075, 1575));
        assert_eq!(all[0].weight, 1000);
        assert_eq!(all[1].rect, Rect::new(1850, 1350, 2150, 1650));
        assert!(all[1].weight < all[0].weight);
    }

    #[test]
    fn test_corner_point_is_clamped() {
        let regions = MeterRegions::compute(Some(PointF::new(0.0, 0.0)), SENSOR, 0.05, 1.5);
        for region in regions.all() {
            assert_eq!(region.rect.left, 0);
            assert_eq!(region.rect.top, 0);
            assert!(region.rect.width() > 0);
        }
    }

    #[test]
    fn test_regions_follow_zoom_crop() {
        // Half zoom on a 4000x3000 sensor.
        let crop = Rect::new(1000, 750, 3000, 2250);
        let regions = MeterRegions::compute(Some(PointF::new(0.0, 0.0)), crop, 0.1, 1.0);
        let primary = regions.all()[0].rect;
        assert_eq!(primary.left, 1000);
        assert_eq!(primary.top, 750);
        assert!(primary.right <= 1075);

        let whole = MeterRegions::compute(None, crop, 0.1, 1.0);
        assert_eq!(whole.all()[0].rect, crop);
    }

    #[test]
    fn test_take_respects_device_limit() {
        let regions = MeterRegions::compute(Some(PointF::center()), SENSOR, 0.05, 1.5);
        assert_eq!(regions.take(1).len(), 1);
        assert_eq!(regions.take(0).len(), 0);
        assert_eq!(regions.take(5).len(), 2);
    }
}
