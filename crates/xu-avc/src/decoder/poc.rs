use super::*;

// ============================================================
// 图像序计数 (8.2.1)
// ============================================================

impl H264SliceDecoder {
    /// 按 SPS 选择的算法推导当前图像的两场序计数
    pub(super) fn decode_picture_order_count(
        &mut self,
        sps: &SequenceParameterSet,
        header: &SliceHeader,
        id: PictureId,
    ) -> XuResult<()> {
        match sps.pic_order_cnt_type {
            PicOrderCntType::Type0 => self.poc_type0(sps, header, id),
            PicOrderCntType::Type1 => self.poc_type1(sps, header, id),
            PicOrderCntType::Type2 => self.poc_type2(sps, header, id),
        }
    }

    /// 类型 0 (8.2.1.1): pic_order_cnt_lsb 加 MSB 回绕进位.
    ///
    /// 直通进位对取前一图像的进位槽 (经逐图像直通, 槽内始终是最近
    /// 一个参考图像的进位); 前一图像带 MMCO 5 时改用其重定位后的
    /// 顶场序计数 (底场则归零). I 条带只在自身推导时按 (0, 0)
    /// 起算, 不覆盖直通对. 非参考图像不得成为进位来源, 因此它把
    /// 直通对原样写回自己的槽位.
    fn poc_type0(
        &mut self,
        sps: &SequenceParameterSet,
        header: &SliceHeader,
        id: PictureId,
    ) -> XuResult<()> {
        let max_lsb = sps.max_pic_order_cnt_lsb() as i32;
        let (pass_msb, pass_lsb) = if let Some(prev) = &self.prev_picture {
            if prev.has_mmco5 {
                if prev.field_pic_flag && prev.bottom_field_flag {
                    (0, 0)
                } else {
                    (0, prev.top_field_order_cnt)
                }
            } else {
                (prev.pic_order_cnt_msb, prev.pic_order_cnt_lsb)
            }
        } else {
            (0, 0)
        };
        let (prev_msb, prev_lsb) = if header.slice_type.is_intra() {
            (0, 0)
        } else {
            (pass_msb, pass_lsb)
        };

        // (8-3) 半量程比较判定 MSB 回绕方向
        let lsb = i32::from(header.pic_order_cnt_lsb);
        let msb = if lsb < prev_lsb && prev_lsb - lsb >= max_lsb / 2 {
            prev_msb + max_lsb
        } else if lsb > prev_lsb && lsb - prev_lsb > max_lsb / 2 {
            prev_msb - max_lsb
        } else {
            prev_msb
        };

        let pic = self.ctx_mut(id)?;
        // (8-4)/(8-5)
        if !header.field_pic_flag {
            pic.top_field_order_cnt = msb + lsb;
            pic.bottom_field_order_cnt =
                pic.top_field_order_cnt + header.delta_pic_order_cnt_bottom;
        } else if header.bottom_field_flag {
            pic.bottom_field_order_cnt = msb + lsb;
        } else {
            pic.top_field_order_cnt = msb + lsb;
        }
        if pic.nal_ref_idc != 0 {
            pic.pic_order_cnt_msb = msb;
            pic.pic_order_cnt_lsb = lsb;
        } else {
            pic.pic_order_cnt_msb = pass_msb;
            pic.pic_order_cnt_lsb = pass_lsb;
        }
        Ok(())
    }

    /// 类型 1 (8.2.1.2): offset_for_ref_frame 周期推出的期望序计数
    fn poc_type1(
        &mut self,
        sps: &SequenceParameterSet,
        header: &SliceHeader,
        id: PictureId,
    ) -> XuResult<()> {
        let frame_num_offset = self.derive_frame_num_offset(header, sps.max_frame_num());
        let is_reference = self.ctx(id)?.nal_ref_idc != 0;

        // (8-8)
        let num_in_cycle = sps.num_ref_frames_in_pic_order_cnt_cycle() as u32;
        let mut abs_frame_num = if num_in_cycle != 0 {
            frame_num_offset + u32::from(header.frame_num)
        } else {
            0
        };
        if !is_reference && abs_frame_num > 0 {
            abs_frame_num -= 1;
        }

        // (8-9)..(8-11)
        let mut expected: i64 = 0;
        if abs_frame_num > 0 {
            let cycle_cnt = (abs_frame_num - 1) / num_in_cycle;
            let frame_num_in_cycle = ((abs_frame_num - 1) % num_in_cycle) as usize;
            let delta_per_cycle: i64 = sps
                .offset_for_ref_frame
                .iter()
                .map(|&o| i64::from(o))
                .sum();
            expected = i64::from(cycle_cnt) * delta_per_cycle;
            for offset in &sps.offset_for_ref_frame[..=frame_num_in_cycle] {
                expected += i64::from(*offset);
            }
        }
        if !is_reference {
            expected += i64::from(sps.offset_for_non_ref_pic);
        }

        let (d0, d1) = if sps.delta_pic_order_always_zero_flag {
            (0, 0)
        } else {
            (header.delta_pic_order_cnt[0], header.delta_pic_order_cnt[1])
        };

        let pic = self.ctx_mut(id)?;
        // (8-12)
        if !header.field_pic_flag {
            let top = expected + i64::from(d0);
            pic.top_field_order_cnt = top as i32;
            pic.bottom_field_order_cnt =
                (top + i64::from(sps.offset_for_top_to_bottom_field) + i64::from(d1)) as i32;
        } else if header.bottom_field_flag {
            pic.bottom_field_order_cnt =
                (expected + i64::from(sps.offset_for_top_to_bottom_field) + i64::from(d0)) as i32;
        } else {
            pic.top_field_order_cnt = (expected + i64::from(d0)) as i32;
        }
        pic.frame_num_offset = frame_num_offset;
        Ok(())
    }

    /// 类型 2 (8.2.1.3): 直接由解码顺序推导, 非参考图像比同帧号的
    /// 参考图像小一
    fn poc_type2(
        &mut self,
        sps: &SequenceParameterSet,
        header: &SliceHeader,
        id: PictureId,
    ) -> XuResult<()> {
        let frame_num_offset = self.derive_frame_num_offset(header, sps.max_frame_num());
        let is_reference = self.ctx(id)?.nal_ref_idc != 0;

        // (8-13)
        let temp: i32 = if header.slice_type.is_intra() {
            0
        } else {
            let base = 2 * i64::from(frame_num_offset) + 2 * i64::from(header.frame_num);
            let value = if is_reference { base } else { base - 1 };
            value as i32
        };

        let pic = self.ctx_mut(id)?;
        // (8-14)
        if !header.field_pic_flag {
            pic.top_field_order_cnt = temp;
            pic.bottom_field_order_cnt = temp;
        } else if header.bottom_field_flag {
            pic.bottom_field_order_cnt = temp;
        } else {
            pic.top_field_order_cnt = temp;
        }
        pic.frame_num_offset = frame_num_offset;
        Ok(())
    }

    /// (8-6)/(8-7): 类型 1 与类型 2 共用的 FrameNumOffset 回绕进位.
    /// 前一图像带 MMCO 5 时其偏移按 0 计.
    fn derive_frame_num_offset(&self, header: &SliceHeader, max_frame_num: u32) -> u32 {
        if header.slice_type.is_intra() {
            return 0;
        }
        let Some(prev) = &self.prev_picture else {
            return 0;
        };
        let prev_offset = if prev.has_mmco5 {
            0
        } else {
            prev.frame_num_offset
        };
        if u32::from(prev.frame_num) > u32::from(header.frame_num) {
            prev_offset + max_frame_num
        } else {
            prev_offset
        }
    }

    /// MMCO 5 的图像末尾效果: 以 PicOrderCnt(当前) 为零点重定位两场
    /// 序计数, 并把解码顺序编号归零 (7.4.3 的推断值).
    pub(super) fn rebase_poc_after_mmco5(&mut self, id: PictureId) -> XuResult<()> {
        let pic = self.ctx_mut(id)?;
        let temp = pic.pic_order_cnt();
        pic.top_field_order_cnt -= temp;
        pic.bottom_field_order_cnt -= temp;
        pic.frame_num = 0;
        pic.frame_num_offset = 0;
        debug!(
            "H264: MMCO 5 序计数重定位, id={} top={} bottom={}",
            id, pic.top_field_order_cnt, pic.bottom_field_order_cnt
        );
        Ok(())
    }
}
