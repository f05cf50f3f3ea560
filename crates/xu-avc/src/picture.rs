//! 图像上下文: 解码图像在参考簿记中的伴随状态.
//!
//! 每个已解码图像 (帧或场) 对应一个 [`PictureContext`], 存放序计数
//! 推导结果, 参考标记状态与 8.2.4.1 派生出的图像编号. 像素数据
//! 不在本层, 图像之间一律通过 [`PictureId`] 间接引用.

use bitflags::bitflags;

use crate::syntax::{SliceHeader, SliceType};

/// 图像的稳定句柄.
///
/// 由 [`crate::dpb::Dpb`] 单调分配, 整个解码会话内不复用,
/// 图像被剔除后句柄随之失效.
pub type PictureId = u64;

/// MaxLongTermFrameIdx 的 "无长期帧索引" 取值
pub const NO_LONG_TERM_FRAME_INDICES: i64 = -1;

bitflags! {
    /// 参考标记状态, 两位互斥使用
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReferenceFlags: u8 {
        /// 短期参考图像
        const SHORT_TERM = 1 << 0;
        /// 长期参考图像
        const LONG_TERM  = 1 << 1;
    }
}

/// 解码图像的簿记状态
#[derive(Debug, Clone)]
pub struct PictureContext {
    /// 分配器授予的句柄
    pub id: PictureId,

    // ============================================================
    // 条带头快照
    // ============================================================
    pub slice_type: SliceType,
    pub nal_ref_idc: u8,
    /// 解码顺序编号, MMCO 5 重定位后归零
    pub frame_num: u16,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,

    // ============================================================
    // 8.2.1 序计数结果与跨图像进位
    // ============================================================
    pub top_field_order_cnt: i32,
    pub bottom_field_order_cnt: i32,
    /// 类型 0 的 MSB 进位槽
    pub pic_order_cnt_msb: i32,
    /// 类型 0 的 LSB 进位槽 (从条带头加宽到 i32)
    pub pic_order_cnt_lsb: i32,
    /// 类型 1/2 的解码顺序偏移进位, MMCO 5 后归零
    pub frame_num_offset: u32,

    // ============================================================
    // 8.2.4.1 图像编号
    // ============================================================
    pub frame_num_wrap: i32,
    pub pic_num: i32,
    pub long_term_pic_num: u32,
    pub long_term_frame_idx: u32,
    /// 标记引擎记录的长期帧索引上限, 无长期参考时为
    /// [`NO_LONG_TERM_FRAME_INDICES`]; 取 i64 容纳整个 u32 值域
    pub max_long_term_frame_idx: i64,

    // ============================================================
    // 8.2.5 标记状态
    // ============================================================
    pub reference: ReferenceFlags,
    /// 本图像的标记命令中出现过 MMCO 5
    pub has_mmco5: bool,
}

impl PictureContext {
    /// 从条带头建立初始上下文, 推导字段全部置为中性值
    pub fn from_slice(id: PictureId, nal_ref_idc: u8, header: &SliceHeader) -> Self {
        PictureContext {
            id,
            slice_type: header.slice_type,
            nal_ref_idc,
            frame_num: header.frame_num,
            field_pic_flag: header.field_pic_flag,
            bottom_field_flag: header.bottom_field_flag,
            top_field_order_cnt: 0,
            bottom_field_order_cnt: 0,
            pic_order_cnt_msb: 0,
            pic_order_cnt_lsb: i32::from(header.pic_order_cnt_lsb),
            frame_num_offset: 0,
            frame_num_wrap: 0,
            pic_num: 0,
            long_term_pic_num: 0,
            long_term_frame_idx: 0,
            max_long_term_frame_idx: NO_LONG_TERM_FRAME_INDICES,
            reference: ReferenceFlags::empty(),
            has_mmco5: false,
        }
    }

    /// PicOrderCnt(picX) (8-33): 帧取两场较小值, 场取本场值
    pub fn pic_order_cnt(&self) -> i32 {
        if self.field_pic_flag {
            if self.bottom_field_flag {
                self.bottom_field_order_cnt
            } else {
                self.top_field_order_cnt
            }
        } else {
            self.top_field_order_cnt.min(self.bottom_field_order_cnt)
        }
    }

    pub fn is_reference(&self) -> bool {
        !self.reference.is_empty()
    }

    pub fn is_short_term_reference(&self) -> bool {
        self.reference.contains(ReferenceFlags::SHORT_TERM)
    }

    pub fn is_long_term_reference(&self) -> bool {
        self.reference.contains(ReferenceFlags::LONG_TERM)
    }

    /// 取消一切参考标记
    pub fn unmark(&mut self) {
        self.reference = ReferenceFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_header(bottom: bool) -> SliceHeader {
        SliceHeader {
            field_pic_flag: true,
            bottom_field_flag: bottom,
            ..Default::default()
        }
    }

    #[test]
    fn frame_pic_order_cnt_takes_minimum_of_both_fields() {
        let mut pic = PictureContext::from_slice(0, 3, &SliceHeader::default());
        pic.top_field_order_cnt = 8;
        pic.bottom_field_order_cnt = 6;
        assert_eq!(pic.pic_order_cnt(), 6, "帧图像取两场中较小的序计数");
    }

    #[test]
    fn field_pic_order_cnt_follows_parity() {
        let mut top = PictureContext::from_slice(0, 3, &field_header(false));
        top.top_field_order_cnt = 4;
        top.bottom_field_order_cnt = 9;
        assert_eq!(top.pic_order_cnt(), 4, "顶场取顶场序计数");

        let mut bottom = PictureContext::from_slice(1, 3, &field_header(true));
        bottom.top_field_order_cnt = 4;
        bottom.bottom_field_order_cnt = 9;
        assert_eq!(bottom.pic_order_cnt(), 9, "底场取底场序计数");
    }

    #[test]
    fn new_picture_starts_unmarked() {
        let pic = PictureContext::from_slice(0, 3, &SliceHeader::default());
        assert!(!pic.is_reference(), "新图像不携带任何参考标记");
        assert_eq!(pic.max_long_term_frame_idx, NO_LONG_TERM_FRAME_INDICES);
    }

    #[test]
    fn unmark_clears_both_flags() {
        let mut pic = PictureContext::from_slice(0, 3, &SliceHeader::default());
        pic.reference = ReferenceFlags::SHORT_TERM | ReferenceFlags::LONG_TERM;
        pic.unmark();
        assert!(!pic.is_short_term_reference());
        assert!(!pic.is_long_term_reference());
    }
}
