//! H264 参考簿记功能自测流水.
//!
//! 目标:
//! - 用公开 API 跑通 参数集 → IDR → P/B 条带 的完整簿记链路.
//! - 验证典型 GOP 结构下的显示顺序恢复、列表内容与窗口上限.

use xu::avc::{
    H264SliceDecoder, NalUnit, PictureId, PictureParameterSet, SequenceParameterSet, SliceHeader,
    SliceType,
};

fn build_sps(max_num_ref_frames: u32) -> SequenceParameterSet {
    SequenceParameterSet {
        // MaxFrameNum = 32, MaxPicOrderCntLsb = 64
        log2_max_frame_num_minus4: 1,
        log2_max_pic_order_cnt_lsb_minus4: 2,
        max_num_ref_frames,
        frame_mbs_only_flag: true,
        ..Default::default()
    }
}

fn build_pps(default_active_minus1: u8) -> PictureParameterSet {
    PictureParameterSet {
        num_ref_idx_l0_default_active_minus1: default_active_minus1,
        num_ref_idx_l1_default_active_minus1: default_active_minus1,
        ..Default::default()
    }
}

fn build_decoder(
    max_num_ref_frames: u32,
    default_active_minus1: u8,
) -> Result<H264SliceDecoder, String> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut decoder = H264SliceDecoder::new();
    decoder
        .process_nal(&NalUnit::sps(build_sps(max_num_ref_frames)))
        .map_err(|e| format!("登记 SPS 失败: {}", e))?;
    decoder
        .process_nal(&NalUnit::pps(build_pps(default_active_minus1)))
        .map_err(|e| format!("登记 PPS 失败: {}", e))?;
    Ok(decoder)
}

fn slice_header(slice_type: SliceType, frame_num: u16, pic_order_cnt_lsb: u16) -> SliceHeader {
    SliceHeader {
        slice_type,
        frame_num,
        pic_order_cnt_lsb,
        ..Default::default()
    }
}

fn decode(
    decoder: &mut H264SliceDecoder,
    nal: &NalUnit,
) -> Result<(PictureId, i32), String> {
    decoder
        .process_nal(nal)
        .map_err(|e| format!("处理条带失败: {}", e))?;
    let pic = decoder
        .current_picture()
        .ok_or("条带处理后缺少当前图像".to_string())?;
    Ok((pic.id, pic.pic_order_cnt()))
}

#[test]
fn test_low_delay_gop_recovers_display_order() {
    let mut decoder = build_decoder(4, 3).expect("构建解码器失败");

    // IDR + 7 个 P, 显示顺序与解码顺序一致
    let mut pocs = Vec::new();
    let (_, poc) = decode(&mut decoder, &NalUnit::idr(slice_header(SliceType::I, 0, 0)))
        .expect("IDR 解码失败");
    pocs.push(poc);
    for i in 1u16..8 {
        let header = slice_header(SliceType::P, i % 32, (i * 2) % 64);
        let (_, poc) = decode(&mut decoder, &NalUnit::slice(3, header)).expect("P 条带解码失败");
        pocs.push(poc);
    }

    let mut sorted = pocs.clone();
    sorted.sort_unstable();
    assert_eq!(pocs, sorted, "低延迟 GOP 的序计数应随解码顺序单调递增");
    assert_eq!(pocs, vec![0, 2, 4, 6, 8, 10, 12, 14]);
}

#[test]
fn test_b_pictures_split_lists_around_current() {
    let mut decoder = build_decoder(4, 1).expect("构建解码器失败");

    // 解码顺序 IDR(0) P(6) B(2) B(4), 经典一层 B 结构
    let (idr, _) = decode(&mut decoder, &NalUnit::idr(slice_header(SliceType::I, 0, 0)))
        .expect("IDR 解码失败");
    let (pref, _) = decode(
        &mut decoder,
        &NalUnit::slice(3, slice_header(SliceType::P, 1, 6)),
    )
    .expect("P 条带解码失败");

    let (_, poc_b1) = decode(
        &mut decoder,
        &NalUnit::slice(0, slice_header(SliceType::B, 2, 2)),
    )
    .expect("B 条带解码失败");
    assert_eq!(poc_b1, 2);
    assert_eq!(
        decoder.ref_pic_list0(),
        &[idr, pref],
        "B 列表 0 应为 前向最近 + 后向最近"
    );
    assert_eq!(
        decoder.ref_pic_list1(),
        &[pref, idr],
        "B 列表 1 应为 后向最近 + 前向最近"
    );

    let (_, poc_b2) = decode(
        &mut decoder,
        &NalUnit::slice(0, slice_header(SliceType::B, 2, 4)),
    )
    .expect("B 条带解码失败");
    assert_eq!(poc_b2, 4);
    assert_eq!(decoder.ref_pic_list0(), &[idr, pref]);

    // 全部图像按序计数排序即为显示顺序 0 2 4 6
    let mut pocs: Vec<i32> = decoder.pictures().map(|p| p.pic_order_cnt()).collect();
    pocs.sort_unstable();
    assert_eq!(pocs, vec![0, 4, 6], "前一非参考 B 已被剔除, 其余按显示顺序排列");
}

#[test]
fn test_sliding_window_caps_reference_set() {
    let mut decoder = build_decoder(3, 2).expect("构建解码器失败");

    decode(&mut decoder, &NalUnit::idr(slice_header(SliceType::I, 0, 0)))
        .expect("IDR 解码失败");
    let mut recent = Vec::new();
    for i in 1u16..10 {
        let header = slice_header(SliceType::P, i % 32, (i * 2) % 64);
        let (id, _) = decode(&mut decoder, &NalUnit::slice(3, header)).expect("P 条带解码失败");
        recent.push(id);

        let refs = decoder.pictures().filter(|p| p.is_reference()).count();
        assert!(refs <= 4, "参考图像数不应超过 max_num_ref_frames + 当前图像");
    }

    // 稳态下列表 0 为窗口存活的两个在先参考帧按 PicNum 降序
    // (当前图像不进入自己的列表)
    let expected: Vec<PictureId> = recent[6..8].iter().rev().copied().collect();
    assert_eq!(
        decoder.ref_pic_list0(),
        expected.as_slice(),
        "窗口稳态下列表 0 应为最近的参考帧"
    );
}

#[test]
fn test_mmco5_restarts_poc_origin_mid_stream() {
    let mut decoder = build_decoder(4, 3).expect("构建解码器失败");

    decode(&mut decoder, &NalUnit::idr(slice_header(SliceType::I, 0, 0)))
        .expect("IDR 解码失败");
    decode(
        &mut decoder,
        &NalUnit::slice(3, slice_header(SliceType::P, 1, 8)),
    )
    .expect("P 条带解码失败");

    let mut header = slice_header(SliceType::P, 2, 16);
    header.drpm.adaptive_ref_pic_marking_mode_flag = true;
    header.drpm.ops = vec![xu::avc::MmcoOp::ClearAll, xu::avc::MmcoOp::End];
    let (rebased, poc) = decode(&mut decoder, &NalUnit::slice(3, header)).expect("MMCO 5 条带失败");
    assert_eq!(poc, 0, "MMCO 5 图像自身成为新的序计数零点");
    assert_eq!(
        decoder.pictures().count(),
        1,
        "MMCO 5 清空此前全部参考图像"
    );
    assert_eq!(
        decoder
            .picture(rebased)
            .expect("重定位图像应存活")
            .frame_num,
        0,
        "MMCO 5 图像的解码顺序编号按推断归零"
    );

    // 后续图像以重定位零点起算
    let (_, poc) = decode(
        &mut decoder,
        &NalUnit::slice(3, slice_header(SliceType::P, 1, 6)),
    )
    .expect("P 条带解码失败");
    assert_eq!(poc, 6, "重定位后进位链从零点重推");
}

#[test]
fn test_idr_closes_gop_and_clears_lists() {
    let mut decoder = build_decoder(4, 3).expect("构建解码器失败");

    decode(&mut decoder, &NalUnit::idr(slice_header(SliceType::I, 0, 0)))
        .expect("IDR 解码失败");
    for i in 1u16..4 {
        let header = slice_header(SliceType::P, i, i * 2);
        decode(&mut decoder, &NalUnit::slice(3, header)).expect("P 条带解码失败");
    }
    assert_eq!(decoder.pictures().count(), 4);

    decode(&mut decoder, &NalUnit::idr(slice_header(SliceType::I, 4, 0)))
        .expect("第二个 IDR 解码失败");
    assert_eq!(decoder.pictures().count(), 1, "IDR 应关闭前一个 GOP");
    assert!(decoder.ref_pic_list0().is_empty(), "I 条带不携带参考列表");
    assert!(decoder.ref_pic_list1().is_empty());
}
