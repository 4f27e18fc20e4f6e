use board_align::{Frame, PixelFormat, RegionOfInterest};

pub const WIDTH: usize = 160;
pub const HEIGHT: usize = 120;

const DARK: u8 = 40;
const BRIGHT: u8 = 220;

/// Gray frame split by a straight edge through `(cx, cy)` at `angle_deg`
/// (counter-clockwise, y up). Pixels on one side are bright, the rest dark.
pub fn edge_frame_at(
    width: usize,
    height: usize,
    cx: f32,
    cy: f32,
    angle_deg: f32,
) -> Frame {
    let theta = angle_deg.to_radians();
    // Edge direction in image coordinates (y down).
    let (dx, dy) = (theta.cos(), -theta.sin());
    let mut data = vec![DARK; width * height];
    for y in 0..height {
        for x in 0..width {
            let px = x as f32 + 0.5 - cx;
            let py = y as f32 + 0.5 - cy;
            if dx * py - dy * px < 0.0 {
                data[y * width + x] = BRIGHT;
            }
        }
    }
    Frame::new(width, height, PixelFormat::Gray8, data)
}

/// Standard test frame with the edge through the center.
pub fn edge_frame(angle_deg: f32) -> Frame {
    edge_frame_at(
        WIDTH,
        HEIGHT,
        WIDTH as f32 * 0.5,
        HEIGHT as f32 * 0.5,
        angle_deg,
    )
}

/// `count` copies of [`edge_frame`], unnumbered like camera output.
pub fn edge_frames(angle_deg: f32, count: usize) -> Vec<Frame> {
    (0..count).map(|_| edge_frame(angle_deg)).collect()
}

pub fn flat_frame() -> Frame {
    Frame::new(WIDTH, HEIGHT, PixelFormat::Gray8, vec![128; WIDTH * HEIGHT])
}

/// Region around the frame center, clear of the borders.
pub fn center_roi() -> RegionOfInterest {
    RegionOfInterest::Rect {
        x: 20,
        y: 10,
        width: WIDTH as i32 - 40,
        height: HEIGHT as i32 - 20,
    }
}
