use super::*;

// ============================================================
// 解码参考图像标记 (8.2.5)
// ============================================================

impl H264SliceDecoder {
    /// 标记引擎入口: 非参考条带不做任何事; I 条带走复位路径;
    /// 其余按 adaptive_ref_pic_marking_mode_flag 在滑动窗口与
    /// MMCO 命令序列之间二选一.
    pub(super) fn apply_reference_marking(
        &mut self,
        sps: &SequenceParameterSet,
        header: &SliceHeader,
        id: PictureId,
    ) -> XuResult<()> {
        if self.ctx(id)?.nal_ref_idc == 0 {
            return Ok(());
        }
        if header.slice_type.is_intra() {
            return self.reset_reference_set(header, id);
        }

        // 滑动窗口与 MMCO 都以最新的 FrameNumWrap/PicNum 为准
        self.derive_picture_numbers(sps, header, id);
        if header.drpm.adaptive_ref_pic_marking_mode_flag {
            self.apply_adaptive_marking(header, id)?;
        } else {
            self.apply_sliding_window(sps, header, id)?;
        }

        // 8.2.5.1: 未被标记为长期的非 I 参考图像最终必为短期
        let pic = self.ctx_mut(id)?;
        if !pic.is_long_term_reference() {
            pic.reference.insert(ReferenceFlags::SHORT_TERM);
        }
        Ok(())
    }

    /// I 条带复位: 清空整个参考集合, 当前图像按
    /// long_term_reference_flag 标记为短期或 0 号长期参考.
    fn reset_reference_set(&mut self, header: &SliceHeader, id: PictureId) -> XuResult<()> {
        for pic in self.dpb.iter_mut() {
            if pic.id != id {
                pic.unmark();
            }
        }
        let pic = self.ctx_mut(id)?;
        if header.drpm.long_term_reference_flag {
            pic.reference = ReferenceFlags::LONG_TERM;
            pic.long_term_frame_idx = 0;
            pic.max_long_term_frame_idx = 0;
        } else {
            pic.reference = ReferenceFlags::SHORT_TERM;
            pic.max_long_term_frame_idx = NO_LONG_TERM_FRAME_INDICES;
        }
        debug!(
            "H264: I 条带复位参考集合, long_term={}",
            header.drpm.long_term_reference_flag
        );
        Ok(())
    }

    /// 滑动窗口 (8.2.5.3): 互补场对的第二场继承短期标记; 参考计数
    /// 达到 max(1, max_num_ref_frames) 时剔除 FrameNumWrap 最小的
    /// 短期图像.
    fn apply_sliding_window(
        &mut self,
        sps: &SequenceParameterSet,
        header: &SliceHeader,
        id: PictureId,
    ) -> XuResult<()> {
        if header.field_pic_flag
            && let Some(comp_id) = self
                .dpb
                .complementary_field_id(header.frame_num, header.bottom_field_flag)
            && self.ctx(comp_id)?.is_short_term_reference()
        {
            self.ctx_mut(id)?.reference.insert(ReferenceFlags::SHORT_TERM);
            return Ok(());
        }

        let limit = sps.max_num_ref_frames.max(1) as usize;
        let num_refs = self
            .dpb
            .iter()
            .filter(|p| p.id != id && p.is_reference())
            .count();
        if num_refs < limit {
            return Ok(());
        }

        let victim = self
            .dpb
            .iter()
            .filter(|p| p.id != id && p.is_short_term_reference())
            .min_by_key(|p| p.frame_num_wrap)
            .map(|p| (p.id, p.field_pic_flag, p.frame_num, p.bottom_field_flag));
        let Some((victim_id, is_field, frame_num, bottom)) = victim else {
            return Ok(());
        };
        debug!("H264: 滑动窗口剔除 FrameNumWrap 最小的短期参考, id={}", victim_id);
        self.ctx_mut(victim_id)?.unmark();
        if is_field {
            // 互补场一并剔除, 缺失时静默
            if let Some(comp) = self.dpb.complementary_field_id(frame_num, bottom) {
                self.ctx_mut(comp)?.unmark();
            }
        }
        Ok(())
    }

    /// MMCO 命令序列 (8.2.5.4), 命令 0 终止
    fn apply_adaptive_marking(&mut self, header: &SliceHeader, id: PictureId) -> XuResult<()> {
        // 8.2.5.4.1: 帧图像 CurrPicNum = frame_num, 场图像加倍偏一
        let curr_pic_num = if header.field_pic_flag {
            2 * i32::from(header.frame_num) + 1
        } else {
            i32::from(header.frame_num)
        };
        for op in &header.drpm.ops {
            match *op {
                MmcoOp::End => break,
                MmcoOp::ForgetShort {
                    difference_of_pic_nums_minus1,
                } => {
                    self.mmco_forget_short(id, curr_pic_num, difference_of_pic_nums_minus1)?;
                }
                MmcoOp::ForgetLong { long_term_pic_num } => {
                    self.mmco_forget_long(id, long_term_pic_num)?;
                }
                MmcoOp::ConvertShortToLong {
                    difference_of_pic_nums_minus1,
                    long_term_frame_idx,
                } => {
                    self.mmco_convert_short_to_long(
                        id,
                        curr_pic_num,
                        difference_of_pic_nums_minus1,
                        long_term_frame_idx,
                    )?;
                }
                MmcoOp::TrimLong {
                    max_long_term_frame_idx_plus1,
                } => {
                    self.mmco_trim_long(max_long_term_frame_idx_plus1);
                }
                MmcoOp::ClearAll => self.mmco_clear_all(id)?,
                MmcoOp::MarkCurrentLong {
                    long_term_frame_idx,
                } => {
                    self.mmco_mark_current_long(id, long_term_frame_idx)?;
                }
            }
        }
        Ok(())
    }

    /// MMCO 1 (8.2.5.4.1): 按 PicNumX 取消短期参考标记, 场图像
    /// 连同互补场
    fn mmco_forget_short(
        &mut self,
        current: PictureId,
        curr_pic_num: i32,
        difference_of_pic_nums_minus1: u32,
    ) -> XuResult<()> {
        let pic_num_x = curr_pic_num - (difference_of_pic_nums_minus1 as i32 + 1);
        let target = self
            .dpb
            .iter()
            .find(|p| p.id != current && p.is_short_term_reference() && p.pic_num == pic_num_x)
            .map(|p| (p.id, p.field_pic_flag, p.frame_num, p.bottom_field_flag));
        let Some((target_id, is_field, frame_num, bottom)) = target else {
            return Err(XuError::InvalidData(format!(
                "H264: MMCO 1 指定的短期参考不存在, pic_num_x={}",
                pic_num_x
            )));
        };
        self.ctx_mut(target_id)?.unmark();
        if is_field {
            let comp = self
                .dpb
                .complementary_field_id(frame_num, bottom)
                .ok_or_else(|| {
                    XuError::InvalidData(format!(
                        "H264: MMCO 1 目标场缺少互补场, pic_num_x={}",
                        pic_num_x
                    ))
                })?;
            self.ctx_mut(comp)?.unmark();
        }
        Ok(())
    }

    /// MMCO 2 (8.2.5.4.2): 按 LongTermPicNum 取消长期参考标记
    fn mmco_forget_long(&mut self, current: PictureId, long_term_pic_num: u32) -> XuResult<()> {
        let target = self.dpb.iter_mut().find(|p| {
            p.id != current
                && p.is_long_term_reference()
                && p.long_term_pic_num == long_term_pic_num
        });
        match target {
            Some(pic) => {
                pic.unmark();
                Ok(())
            }
            None => Err(XuError::InvalidData(format!(
                "H264: MMCO 2 指定的长期参考不存在, long_term_pic_num={}",
                long_term_pic_num
            ))),
        }
    }

    /// MMCO 3 (8.2.5.4.3): 先清除占用该索引的长期图像, 再把
    /// PicNumX 处的短期图像连同互补场提升为长期
    fn mmco_convert_short_to_long(
        &mut self,
        current: PictureId,
        curr_pic_num: i32,
        difference_of_pic_nums_minus1: u32,
        long_term_frame_idx: u32,
    ) -> XuResult<()> {
        for pic in self.dpb.iter_mut() {
            if pic.id != current
                && pic.is_long_term_reference()
                && pic.long_term_frame_idx == long_term_frame_idx
            {
                pic.unmark();
            }
        }

        let pic_num_x = curr_pic_num - (difference_of_pic_nums_minus1 as i32 + 1);
        let target = self
            .dpb
            .iter()
            .find(|p| p.id != current && p.is_short_term_reference() && p.pic_num == pic_num_x)
            .map(|p| (p.id, p.field_pic_flag, p.frame_num, p.bottom_field_flag));
        let Some((target_id, is_field, frame_num, bottom)) = target else {
            return Err(XuError::InvalidData(format!(
                "H264: MMCO 3 指定的短期参考不存在, pic_num_x={}",
                pic_num_x
            )));
        };
        self.promote_to_long_term(target_id, long_term_frame_idx)?;
        if is_field {
            let comp = self
                .dpb
                .complementary_field_id(frame_num, bottom)
                .ok_or_else(|| {
                    XuError::InvalidData(format!(
                        "H264: MMCO 3 目标场缺少互补场, pic_num_x={}",
                        pic_num_x
                    ))
                })?;
            self.promote_to_long_term(comp, long_term_frame_idx)?;
        }
        Ok(())
    }

    /// MMCO 4 (8.2.5.4.4): 收缩长期帧索引上限并在全部图像上记录
    /// 新上限, 超界的长期参考取消标记; 参数 0 不留任何长期索引.
    /// 比较在 i64 内进行, 避免大参数在窄类型里回绕.
    fn mmco_trim_long(&mut self, max_long_term_frame_idx_plus1: u32) {
        let bound = i64::from(max_long_term_frame_idx_plus1) - 1;
        for pic in self.dpb.iter_mut() {
            if pic.is_long_term_reference() && i64::from(pic.long_term_frame_idx) > bound {
                pic.unmark();
            }
            pic.max_long_term_frame_idx = bound;
        }
    }

    /// MMCO 5 (8.2.5.4.5): 清空参考集合, 所有图像的长期索引上限
    /// 归 −1, 并注册序计数重定位效果
    fn mmco_clear_all(&mut self, current: PictureId) -> XuResult<()> {
        for pic in self.dpb.iter_mut() {
            if pic.id != current {
                pic.unmark();
            }
            pic.max_long_term_frame_idx = NO_LONG_TERM_FRAME_INDICES;
        }
        self.ctx_mut(current)?.has_mmco5 = true;
        self.pending_effects
            .push(DeferredEffect::RebasePocAfterMmco5 { pic: current });
        debug!("H264: MMCO 5 清空参考集合");
        Ok(())
    }

    /// MMCO 6 (8.2.5.4.6): 清除占用该索引的长期图像后, 把当前图像
    /// 标记为该索引上的长期参考, 互补场尽力传播
    fn mmco_mark_current_long(
        &mut self,
        current: PictureId,
        long_term_frame_idx: u32,
    ) -> XuResult<()> {
        let conflicts: Vec<_> = self
            .dpb
            .iter()
            .filter(|p| {
                p.id != current
                    && p.is_long_term_reference()
                    && p.long_term_frame_idx == long_term_frame_idx
            })
            .map(|p| (p.id, p.field_pic_flag, p.frame_num, p.bottom_field_flag))
            .collect();
        for (conflict_id, is_field, frame_num, bottom) in conflicts {
            self.ctx_mut(conflict_id)?.unmark();
            if is_field
                && let Some(comp) = self.dpb.complementary_field_id(frame_num, bottom)
                && comp != current
            {
                self.ctx_mut(comp)?.unmark();
            }
        }

        let pic = self.ctx_mut(current)?;
        pic.reference.insert(ReferenceFlags::LONG_TERM);
        pic.long_term_frame_idx = long_term_frame_idx;
        let (is_field, frame_num, bottom) =
            (pic.field_pic_flag, pic.frame_num, pic.bottom_field_flag);
        if is_field && let Some(comp) = self.dpb.complementary_field_id(frame_num, bottom) {
            self.promote_to_long_term(comp, long_term_frame_idx)?;
        }
        Ok(())
    }

    /// 短期转长期: 换标记位并落新索引
    fn promote_to_long_term(&mut self, id: PictureId, long_term_frame_idx: u32) -> XuResult<()> {
        let pic = self.ctx_mut(id)?;
        pic.reference.remove(ReferenceFlags::SHORT_TERM);
        pic.reference.insert(ReferenceFlags::LONG_TERM);
        pic.long_term_frame_idx = long_term_frame_idx;
        Ok(())
    }
}
