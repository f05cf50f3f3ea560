//! 解码图像缓冲 (DPB) 的簿记部分.
//!
//! 以竞技场方式持有全部 [`PictureContext`], 按单调递增的
//! [`PictureId`] 寻址. 图像之间不存在直接引用, 剔除一个图像
//! 不会使其余句柄失效.

use crate::picture::{PictureContext, PictureId};
use crate::syntax::SliceHeader;

/// 图像上下文竞技场
#[derive(Debug, Clone, Default)]
pub struct Dpb {
    pictures: Vec<PictureContext>,
    next_id: PictureId,
}

impl Dpb {
    pub fn new() -> Self {
        Dpb::default()
    }

    /// 为新条带建立图像上下文并返回句柄.
    ///
    /// 句柄在会话内单调递增, 永不复用.
    pub fn alloc(&mut self, nal_ref_idc: u8, header: &SliceHeader) -> PictureId {
        let id = self.next_id;
        self.next_id += 1;
        self.pictures
            .push(PictureContext::from_slice(id, nal_ref_idc, header));
        id
    }

    pub fn get(&self, id: PictureId) -> Option<&PictureContext> {
        self.pictures.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PictureId) -> Option<&mut PictureContext> {
        self.pictures.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PictureContext> {
        self.pictures.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PictureContext> {
        self.pictures.iter_mut()
    }

    /// 按谓词保留图像, 其余剔除
    pub fn retain(&mut self, keep: impl FnMut(&PictureContext) -> bool) {
        self.pictures.retain(keep);
    }

    /// 查找指定图像的互补场: 同 frame_num, 同为场图像, 极性相反
    pub fn complementary_field_id(
        &self,
        frame_num: u16,
        bottom_field_flag: bool,
    ) -> Option<PictureId> {
        self.pictures
            .iter()
            .find(|p| {
                p.field_pic_flag
                    && p.frame_num == frame_num
                    && p.bottom_field_flag != bottom_field_flag
            })
            .map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.pictures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_header(frame_num: u16, bottom: bool) -> SliceHeader {
        SliceHeader {
            frame_num,
            field_pic_flag: true,
            bottom_field_flag: bottom,
            ..Default::default()
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut dpb = Dpb::new();
        let a = dpb.alloc(3, &SliceHeader::default());
        let b = dpb.alloc(3, &SliceHeader::default());
        assert!(b > a, "句柄单调递增");

        dpb.retain(|p| p.id != a);
        let c = dpb.alloc(3, &SliceHeader::default());
        assert!(c > b, "剔除后句柄不复用");
        assert!(dpb.get(a).is_none(), "被剔除的句柄失效");
        assert!(dpb.get(b).is_some());
    }

    #[test]
    fn complementary_field_lookup_matches_opposite_parity() {
        let mut dpb = Dpb::new();
        let top = dpb.alloc(3, &field_header(7, false));
        let bottom = dpb.alloc(3, &field_header(7, true));
        dpb.alloc(3, &field_header(8, false));

        assert_eq!(dpb.complementary_field_id(7, true), Some(top));
        assert_eq!(dpb.complementary_field_id(7, false), Some(bottom));
        assert_eq!(dpb.complementary_field_id(9, false), None, "无互补场");
    }

    #[test]
    fn frame_pictures_never_match_as_complementary_fields() {
        let mut dpb = Dpb::new();
        dpb.alloc(
            3,
            &SliceHeader {
                frame_num: 7,
                ..Default::default()
            },
        );
        assert_eq!(dpb.complementary_field_id(7, true), None, "帧图像不参与场配对");
    }
}
