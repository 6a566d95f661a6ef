/// Copy `src` (a `src_w` x `src_h` row-major image, `stride` bytes per
/// pixel) into `dst` (a `dst_w` x `dst_h` image) with its top-left
/// corner at (`dx`, `dy`).
///
/// The source must lie fully inside the destination; the atlas builder
/// guarantees this by construction.
pub fn blit(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    dx: u32,
    dy: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    stride: usize,
) {
    debug_assert!(dx + src_w <= dst_w && dy + src_h <= dst_h);
    debug_assert!(src.len() >= src_w as usize * src_h as usize * stride);
    debug_assert!(dst.len() >= dst_w as usize * dst_h as usize * stride);

    let dst_row_bytes = dst_w as usize * stride;
    let src_row_bytes = src_w as usize * stride;
    for row in 0..src_h as usize {
        let src_row = &src[row * src_row_bytes..][..src_row_bytes];
        let dst_start = (dy as usize + row) * dst_row_bytes + dx as usize * stride;
        dst[dst_start..dst_start + src_row_bytes].copy_from_slice(src_row);
    }
}
