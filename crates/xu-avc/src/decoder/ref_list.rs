use super::*;

// ============================================================
// 参考图像列表 (8.2.4)
// ============================================================

impl H264SliceDecoder {
    /// 8.2.4.1: 为集合里的每个参考图像刷新 FrameNumWrap / PicNum /
    /// LongTermPicNum. 一律用被检图像自身的字段推导, 场图像的编号
    /// 按与当前图像的奇偶关系加倍.
    pub(super) fn derive_picture_numbers(
        &mut self,
        sps: &SequenceParameterSet,
        header: &SliceHeader,
        current: PictureId,
    ) {
        let max_frame_num = sps.max_frame_num() as i32;
        let cur_frame_num = i32::from(header.frame_num);
        let cur_is_field = header.field_pic_flag;
        let cur_bottom = header.bottom_field_flag;
        for pic in self.dpb.iter_mut() {
            if pic.id == current {
                continue;
            }
            if pic.is_short_term_reference() {
                // (8-27)
                let frame_num = i32::from(pic.frame_num);
                pic.frame_num_wrap = if frame_num > cur_frame_num {
                    frame_num - max_frame_num
                } else {
                    frame_num
                };
                // (8-28)..(8-30)
                pic.pic_num = if !cur_is_field {
                    pic.frame_num_wrap
                } else if pic.bottom_field_flag == cur_bottom {
                    2 * pic.frame_num_wrap + 1
                } else {
                    2 * pic.frame_num_wrap
                };
            }
            if pic.is_long_term_reference() {
                // (8-31)/(8-32)
                pic.long_term_pic_num = if !cur_is_field {
                    pic.long_term_frame_idx
                } else if pic.bottom_field_flag == cur_bottom {
                    2 * pic.long_term_frame_idx + 1
                } else {
                    2 * pic.long_term_frame_idx
                };
            }
        }
    }

    /// 8.2.4 入口: 刷新图像编号, 初始化 P/B 列表, 按条带头命令重排,
    /// 最后截断到活动参考数.
    pub(super) fn build_reference_picture_lists(
        &mut self,
        sps: &SequenceParameterSet,
        pps: &PictureParameterSet,
        header: &SliceHeader,
        current: PictureId,
    ) -> XuResult<()> {
        self.derive_picture_numbers(sps, header, current);

        if header.field_pic_flag {
            return Err(XuError::NotImplemented(
                "H264: 场图像的参考列表初始化未实现".into(),
            ));
        }

        match header.slice_type {
            SliceType::P | SliceType::Sp => {
                self.init_p_list(current);
                self.ref_pic_list1.clear();
            }
            SliceType::B => self.init_b_lists(current)?,
            SliceType::I => {
                self.ref_pic_list0.clear();
                self.ref_pic_list1.clear();
                return Ok(());
            }
        }

        // 场路径已在上面挡下, CurrPicNum/MaxPicNum 取帧取值
        let curr_pic_num = i32::from(header.frame_num);
        let max_pic_num = sps.max_frame_num() as i32;
        if header.ref_pic_list_modification_flag_l0 {
            modify_list(
                &self.dpb,
                &mut self.ref_pic_list0,
                current,
                &header.ref_pic_list_mods_l0,
                curr_pic_num,
                max_pic_num,
            )?;
        }
        if header.slice_type.uses_list1() && header.ref_pic_list_modification_flag_l1 {
            modify_list(
                &self.dpb,
                &mut self.ref_pic_list1,
                current,
                &header.ref_pic_list_mods_l1,
                curr_pic_num,
                max_pic_num,
            )?;
        }

        let (active_l0, active_l1) = if header.num_ref_idx_active_override_flag {
            (
                header.num_ref_idx_l0_active_minus1 as usize + 1,
                header.num_ref_idx_l1_active_minus1 as usize + 1,
            )
        } else {
            (
                pps.num_ref_idx_l0_default_active_minus1 as usize + 1,
                pps.num_ref_idx_l1_default_active_minus1 as usize + 1,
            )
        };
        self.ref_pic_list0.truncate(active_l0);
        if header.slice_type.uses_list1() {
            self.ref_pic_list1.truncate(active_l1);
        }

        debug!(
            "H264: 参考列表就绪, slice_type={:?} l0={} l1={}",
            header.slice_type,
            self.ref_pic_list0.len(),
            self.ref_pic_list1.len()
        );
        Ok(())
    }

    /// 8.2.4.2.1: P/SP 帧的列表 0 = 短期按 PicNum 降序 + 长期按
    /// LongTermPicNum 升序
    fn init_p_list(&mut self, current: PictureId) {
        let mut short: Vec<(i32, PictureId)> = self
            .dpb
            .iter()
            .filter(|p| p.id != current && p.is_short_term_reference())
            .map(|p| (p.pic_num, p.id))
            .collect();
        short.sort_by(|a, b| b.0.cmp(&a.0));
        let mut long: Vec<(u32, PictureId)> = self
            .dpb
            .iter()
            .filter(|p| p.id != current && p.is_long_term_reference())
            .map(|p| (p.long_term_pic_num, p.id))
            .collect();
        long.sort_by_key(|entry| entry.0);

        self.ref_pic_list0.clear();
        self.ref_pic_list0.extend(short.into_iter().map(|(_, id)| id));
        self.ref_pic_list0.extend(long.into_iter().map(|(_, id)| id));
    }

    /// 8.2.4.2.3: B 帧的两个列表按相对当前 POC 的分组排序, 列表 1
    /// 交换前后两组; 两列表全同且长于 1 时交换列表 1 的前两项.
    fn init_b_lists(&mut self, current: PictureId) -> XuResult<()> {
        let cur_poc = self.ctx(current)?.pic_order_cnt();

        let mut before: Vec<(i32, PictureId)> = self
            .dpb
            .iter()
            .filter(|p| p.id != current && p.is_short_term_reference())
            .filter(|p| p.pic_order_cnt() < cur_poc)
            .map(|p| (p.pic_order_cnt(), p.id))
            .collect();
        before.sort_by(|a, b| b.0.cmp(&a.0));
        let mut after: Vec<(i32, PictureId)> = self
            .dpb
            .iter()
            .filter(|p| p.id != current && p.is_short_term_reference())
            .filter(|p| p.pic_order_cnt() > cur_poc)
            .map(|p| (p.pic_order_cnt(), p.id))
            .collect();
        after.sort_by_key(|entry| entry.0);
        let mut long: Vec<(u32, PictureId)> = self
            .dpb
            .iter()
            .filter(|p| p.id != current && p.is_long_term_reference())
            .map(|p| (p.long_term_pic_num, p.id))
            .collect();
        long.sort_by_key(|entry| entry.0);

        self.ref_pic_list0.clear();
        self.ref_pic_list0.extend(before.iter().map(|&(_, id)| id));
        self.ref_pic_list0.extend(after.iter().map(|&(_, id)| id));
        self.ref_pic_list0.extend(long.iter().map(|&(_, id)| id));

        self.ref_pic_list1.clear();
        self.ref_pic_list1.extend(after.iter().map(|&(_, id)| id));
        self.ref_pic_list1.extend(before.iter().map(|&(_, id)| id));
        self.ref_pic_list1.extend(long.iter().map(|&(_, id)| id));

        if self.ref_pic_list1.len() > 1 && self.ref_pic_list1 == self.ref_pic_list0 {
            self.ref_pic_list1.swap(0, 1);
        }
        Ok(())
    }
}

// ============================================================
// 8.2.4.3 列表重排
// ============================================================

/// 对单个列表执行重排命令序列.
///
/// 预测值 picNumLXPred 跨命令保持; 命令 0/1 在 MaxPicNum 模域内做
/// 带回绕的加减 ((8-34)/(8-35)), 命令 2 直接点名长期图像, 命令 3
/// 终止. 选中图像插到游标处, 游标之后解析到同一图像编号的旧项移除.
fn modify_list(
    dpb: &Dpb,
    list: &mut Vec<PictureId>,
    current: PictureId,
    mods: &[RefPicListMod],
    curr_pic_num: i32,
    max_pic_num: i32,
) -> XuResult<()> {
    let mut cursor = 0usize;
    let mut pic_num_pred = curr_pic_num;
    for cmd in mods {
        match *cmd {
            RefPicListMod::End => break,
            RefPicListMod::ShortTermSub {
                abs_diff_pic_num_minus1,
            }
            | RefPicListMod::ShortTermAdd {
                abs_diff_pic_num_minus1,
            } => {
                let abs_diff = abs_diff_pic_num_minus1 as i32 + 1;
                let subtract = matches!(cmd, RefPicListMod::ShortTermSub { .. });
                // (8-34)/(8-35)
                let no_wrap = if subtract {
                    if pic_num_pred - abs_diff < 0 {
                        pic_num_pred - abs_diff + max_pic_num
                    } else {
                        pic_num_pred - abs_diff
                    }
                } else if pic_num_pred + abs_diff >= max_pic_num {
                    pic_num_pred + abs_diff - max_pic_num
                } else {
                    pic_num_pred + abs_diff
                };
                pic_num_pred = no_wrap;
                // (8-36)
                let pic_num = if no_wrap > curr_pic_num {
                    no_wrap - max_pic_num
                } else {
                    no_wrap
                };
                let target = dpb
                    .iter()
                    .find(|p| {
                        p.id != current && p.is_short_term_reference() && p.pic_num == pic_num
                    })
                    .map(|p| p.id)
                    .ok_or_else(|| {
                        XuError::InvalidData(format!(
                            "H264: 重排命令指定的短期参考不存在, pic_num={}",
                            pic_num
                        ))
                    })?;
                insert_and_prune(dpb, list, cursor, target, |p| {
                    p.is_short_term_reference() && p.pic_num == pic_num
                });
                cursor += 1;
            }
            RefPicListMod::LongTerm { long_term_pic_num } => {
                let target = dpb
                    .iter()
                    .find(|p| {
                        p.id != current
                            && p.is_long_term_reference()
                            && p.long_term_pic_num == long_term_pic_num
                    })
                    .map(|p| p.id)
                    .ok_or_else(|| {
                        XuError::InvalidData(format!(
                            "H264: 重排命令指定的长期参考不存在, long_term_pic_num={}",
                            long_term_pic_num
                        ))
                    })?;
                insert_and_prune(dpb, list, cursor, target, |p| {
                    p.is_long_term_reference() && p.long_term_pic_num == long_term_pic_num
                });
                cursor += 1;
            }
        }
    }
    Ok(())
}

/// (8-40) 的插入步骤: 目标插到游标处, 游标之后仍解析到同一图像
/// 编号的旧项全部移除; 解析不中的项 (含已失去标记的) 原样保留.
fn insert_and_prune(
    dpb: &Dpb,
    list: &mut Vec<PictureId>,
    cursor: usize,
    target: PictureId,
    matches_designation: impl Fn(&PictureContext) -> bool,
) {
    let cursor = cursor.min(list.len());
    list.insert(cursor, target);
    let mut idx = cursor + 1;
    while idx < list.len() {
        let stale = dpb
            .get(list[idx])
            .map(|p| matches_designation(p))
            .unwrap_or(false);
        if stale {
            list.remove(idx);
        } else {
            idx += 1;
        }
    }
}
